use std::collections::BTreeMap;
use std::sync::Mutex;


/// Point-in-time view of the execution's enrichment counters.
///
/// Counters are keyed by a backend identifier (driver plus connection
/// name). Snapshots are taken at span start and finish; the tracer tags
/// each span with the difference so nested spans report only the work
/// done during their own window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub query_count: BTreeMap<String, u64>,
    pub query_duration_ms: BTreeMap<String, f64>,
    pub command_count: BTreeMap<String, u64>,
    pub command_duration_ms: BTreeMap<String, f64>,
    pub memory_bytes: u64,
    pub system_load: Option<[f64; 3]>,
}


/// Source of enrichment snapshots, injected into the tracer.
///
/// Database and cache call sites feed a collector instead of hidden
/// global listeners; the tracer only ever reads snapshots from it.
pub trait MetricsCollector: Send + Sync {
    fn snapshot(&self) -> MetricsSnapshot;
}


/// Collector that never reports any work.
#[derive(Debug, Default)]
pub struct NullCollector;

impl MetricsCollector for NullCollector {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}


#[derive(Debug, Default)]
struct Counters {
    query_count: BTreeMap<String, u64>,
    query_duration_ms: BTreeMap<String, f64>,
    command_count: BTreeMap<String, u64>,
    command_duration_ms: BTreeMap<String, f64>,
}


/// Default collector: shared counters plus process memory and load.
///
/// Call sites record queries and cache commands as they happen; memory
/// and system load are read from `/proc` on Linux and reported as zero
/// or absent elsewhere.
#[derive(Debug, Default)]
pub struct RuntimeCollector {
    counters: Mutex<Counters>,
}

impl RuntimeCollector {
    pub fn new() -> RuntimeCollector {
        RuntimeCollector::default()
    }

    /// Record one database query against a backend identifier.
    pub fn record_query(&self, backend: &str, duration_ms: f64) {
        let mut counters = self.counters.lock().expect("metrics counters poisoned");
        *counters.query_count.entry(String::from(backend)).or_insert(0) += 1;
        *counters
            .query_duration_ms
            .entry(String::from(backend))
            .or_insert(0.0) += duration_ms;
    }

    /// Record one cache command against a backend identifier.
    pub fn record_command(&self, backend: &str, duration_ms: f64) {
        let mut counters = self.counters.lock().expect("metrics counters poisoned");
        *counters
            .command_count
            .entry(String::from(backend))
            .or_insert(0) += 1;
        *counters
            .command_duration_ms
            .entry(String::from(backend))
            .or_insert(0.0) += duration_ms;
    }
}

impl MetricsCollector for RuntimeCollector {
    fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock().expect("metrics counters poisoned");
        MetricsSnapshot {
            query_count: counters.query_count.clone(),
            query_duration_ms: counters.query_duration_ms.clone(),
            command_count: counters.command_count.clone(),
            command_duration_ms: counters.command_duration_ms.clone(),
            memory_bytes: process_memory_bytes(),
            system_load: system_load(),
        }
    }
}


/// Resident set size of the current process, in bytes.
#[cfg(target_os = "linux")]
pub fn process_memory_bytes() -> u64 {
    let statm = match std::fs::read_to_string("/proc/self/statm") {
        Ok(statm) => statm,
        Err(_) => return 0,
    };
    let resident_pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|pages| pages.parse().ok())
        .unwrap_or(0);
    resident_pages * 4096
}

#[cfg(not(target_os = "linux"))]
pub fn process_memory_bytes() -> u64 {
    0
}

/// One, five and fifteen minute load averages.
#[cfg(target_os = "linux")]
pub fn system_load() -> Option<[f64; 3]> {
    let loadavg = std::fs::read_to_string("/proc/loadavg").ok()?;
    let mut fields = loadavg.split_whitespace();
    let one = fields.next()?.parse().ok()?;
    let five = fields.next()?.parse().ok()?;
    let fifteen = fields.next()?.parse().ok()?;
    Some([one, five, fifteen])
}

#[cfg(not(target_os = "linux"))]
pub fn system_load() -> Option<[f64; 3]> {
    None
}
