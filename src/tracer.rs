use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::carrier::MapCarrier;
use crate::config::Config;
use crate::context::SamplingFlags;
use crate::context::TraceContext;
use crate::metrics::MetricsCollector;
use crate::metrics::MetricsSnapshot;
use crate::metrics::RuntimeCollector;
use crate::propagation;
use crate::propagation::Extraction;
use crate::report::Reporter;
use crate::sampler::SampleDecision;
use crate::sampler::Sampler;
use crate::span::FinishedSpan;
use crate::span::Kind;
use crate::span::Span;
use crate::span::tag::TagValue;
use crate::tags;


/// Span stack manager for one logical execution.
///
/// A `Tracer` owns the active-context stack for a single inbound request
/// or console invocation; concurrent executions each get their own
/// instance and never share span state. Parent linkage is resolved from
/// the stack top, then from the extracted inbound context, then from a
/// fresh sampling decision.
///
/// Finished spans are buffered until `Tracer::flush` hands them to the
/// configured `Reporter`; dropping the tracer flushes implicitly.
pub struct Tracer {
    sampler: Sampler,
    body_size: usize,
    collector: Arc<dyn MetricsCollector>,
    reporter: Box<dyn Reporter>,
    stack: Vec<TraceContext>,
    buffer: Vec<FinishedSpan>,
    inbound: Option<Extraction>,
}

impl Tracer {
    /// Build a tracer with the default runtime metrics collector.
    pub fn new(config: &Config, reporter: Box<dyn Reporter>) -> Tracer {
        Tracer::with_collector(config, reporter, Arc::new(RuntimeCollector::new()))
    }

    /// Build a tracer reading enrichment snapshots from `collector`.
    pub fn with_collector(
        config: &Config,
        reporter: Box<dyn Reporter>,
        collector: Arc<dyn MetricsCollector>,
    ) -> Tracer {
        Tracer {
            sampler: Sampler::new(config.sample_rate),
            body_size: config.body_size,
            collector,
            reporter,
            stack: Vec::new(),
            buffer: Vec::new(),
            inbound: None,
        }
    }
}

impl Tracer {
    /// Extract and remember the inbound trace state for this execution.
    ///
    /// Used as the root-span parent when the context stack is empty.
    pub fn set_inbound(&mut self, carrier: &dyn MapCarrier) {
        self.inbound = Some(propagation::extract(carrier));
    }

    /// Start a span, resolving its parent and pushing its context.
    ///
    /// Sampled spans synchronously capture a start-of-span enrichment
    /// snapshot and the runtime tags; unsampled spans skip all payload
    /// work but still take part in stack bookkeeping.
    pub fn start_span(&mut self, name: &str, kind: Option<Kind>) -> Span {
        let context = self.next_context();
        self.stack.push(context.clone());
        let mut span = Span::new(name, kind, context);
        if span.is_sampled() {
            let snapshot = self.collector.snapshot();
            span.tag(tags::RUNTIME_TRACER_VERSION, env!("CARGO_PKG_VERSION"));
            span.tag(tags::RUNTIME_OS, std::env::consts::OS);
            if let Some(load) = snapshot.system_load {
                span.tag(tags::RUNTIME_START_SYSTEM_LOAD, format_load(&load));
            }
            span.set_start_snapshot(snapshot);
        }
        span
    }

    /// Append a tag to a span.
    ///
    /// Convenience mirror of `Span::tag` for call sites holding a tracer
    /// reference; the same total coercion applies.
    pub fn tag<TV: Into<TagValue>>(&self, span: &mut Span, key: &str, value: TV) {
        span.tag(key, value);
    }

    /// Finish a span: duration, enrichment deltas, stack pop, buffering.
    ///
    /// The pop is positional: the entry matching the span is removed
    /// wherever it sits, tolerating interleaved finishes upstream.
    /// Consuming the `Span` makes re-finishing a compile-time error.
    pub fn finish(&mut self, span: Span) {
        let duration_micros = SystemTime::now()
            .duration_since(span.start())
            .map(|elapsed| elapsed.as_micros() as u64)
            .unwrap_or(0);
        let mut span = span;
        if span.is_sampled() {
            if let Some(start) = span.start_snapshot().cloned() {
                let finish = self.collector.snapshot();
                tag_enrichment(&mut span, &start, &finish);
            }
        }
        let span_id = span.context().span_id();
        if let Some(position) = self
            .stack
            .iter()
            .rposition(|context| context.span_id() == span_id)
        {
            self.stack.remove(position);
        } else {
            tracing::debug!("finished span {:016x} was not on the stack", span_id);
        }
        self.buffer.push(span.into_finished(duration_micros));
    }

    /// Run `operation` inside a span.
    ///
    /// An `Err` from the operation is recorded as an `error` tag when the
    /// span is sampled and then returned unchanged: tracing observes
    /// failures, it never alters them.
    pub fn span<T, E, F>(
        &mut self,
        name: &str,
        kind: Option<Kind>,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut Tracer, &mut Span) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut span = self.start_span(name, kind);
        let result = operation(self, &mut span);
        if let Err(error) = &result {
            if span.is_sampled() {
                span.tag(tags::ERROR, error.to_string());
            }
        }
        self.finish(span);
        result
    }

    /// Trace an inbound request handler; flushes when the span ends.
    pub fn server_span<T, E, F>(&mut self, name: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tracer, &mut Span) -> Result<T, E>,
        E: fmt::Display,
    {
        let result = self.span(name, Some(Kind::Server), operation);
        self.flush();
        result
    }

    /// Trace an outbound call.
    pub fn client_span<T, E, F>(&mut self, name: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tracer, &mut Span) -> Result<T, E>,
        E: fmt::Display,
    {
        self.span(name, Some(Kind::Client), operation)
    }

    /// Hand all buffered finished spans to the reporter now.
    ///
    /// Reporting failures are logged and swallowed; the batch is dropped.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch: Vec<FinishedSpan> = self.buffer.drain(..).collect();
        if let Err(error) = self.reporter.report(&batch) {
            tracing::error!("span report failed: {}", error);
        }
    }

    /// Number of contexts currently on the active stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of finished spans waiting for the next flush.
    pub fn pending_spans(&self) -> usize {
        self.buffer.len()
    }

    /// Truncate an HTTP body for tagging.
    ///
    /// `size` is the already-known byte length, when the caller has it.
    /// Bodies over the configured limit are cut to that many characters
    /// with a ` ...` marker appended.
    pub fn format_http_body(&self, body: &str, size: Option<usize>) -> String {
        let size = size.unwrap_or_else(|| body.len());
        if size > self.body_size {
            let truncated: String = body.chars().take(self.body_size).collect();
            format!("{} ...", truncated)
        } else {
            String::from(body)
        }
    }

    fn next_context(&mut self) -> TraceContext {
        if let Some(parent) = self.stack.last() {
            return TraceContext::child_of(parent);
        }
        match &self.inbound {
            Some(Extraction::Context(parent)) => TraceContext::child_of(parent),
            Some(Extraction::Flags(flags)) => {
                let flags = if flags.is_sampled().is_none() {
                    self.decide_flags(flags.is_debug())
                } else {
                    *flags
                };
                TraceContext::new_root(flags)
            }
            None => {
                let flags = self.decide_flags(false);
                TraceContext::new_root(flags)
            }
        }
    }

    fn decide_flags(&self, debug: bool) -> SamplingFlags {
        let sampled = match self.sampler.decide() {
            SampleDecision::Sampled => true,
            SampleDecision::NotSampled => false,
            // Local policy is always-sample: a deferring sampler means
            // "record here, let the collector decide what to keep".
            SampleDecision::Defer => true,
        };
        SamplingFlags::new(Some(sampled), debug)
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        self.flush()
    }
}


fn tag_enrichment(span: &mut Span, start: &MetricsSnapshot, finish: &MetricsSnapshot) {
    for (backend, value) in &finish.query_count {
        let delta = value - start.query_count.get(backend).unwrap_or(&0);
        span.tag(&format!("{}.{}", tags::DB_QUERY_TIMES, backend), delta);
    }
    for (backend, value) in &finish.query_duration_ms {
        let delta = value - start.query_duration_ms.get(backend).unwrap_or(&0.0);
        span.tag(
            &format!("{}.{}", tags::DB_QUERY_TOTAL_DURATION, backend),
            format!("{}ms", delta),
        );
    }
    for (backend, value) in &finish.command_count {
        let delta = value - start.command_count.get(backend).unwrap_or(&0);
        span.tag(&format!("{}.{}", tags::CACHE_EXEC_TIMES, backend), delta);
    }
    for (backend, value) in &finish.command_duration_ms {
        let delta = value - start.command_duration_ms.get(backend).unwrap_or(&0.0);
        span.tag(
            &format!("{}.{}", tags::CACHE_EXEC_TOTAL_DURATION, backend),
            format!("{}ms", delta),
        );
    }
    let memory_delta = finish.memory_bytes.saturating_sub(start.memory_bytes);
    span.tag(
        tags::RUNTIME_MEMORY,
        format!("{:.2}MB", memory_delta as f64 / 1_000_000.0),
    );
    if let Some(load) = finish.system_load {
        span.tag(tags::RUNTIME_FINISH_SYSTEM_LOAD, format_load(&load));
    }
}

fn format_load(load: &[f64; 3]) -> String {
    format!("{:.2},{:.2},{:.2}", load[0], load[1], load[2])
}


/// Replace purely numeric path segments with a `{id}` placeholder.
pub fn format_http_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<&str>>()
        .join("/")
}

/// Route patterns are reported with a leading slash.
pub fn format_route_path(route: &str) -> String {
    if route.starts_with('/') {
        String::from(route)
    } else {
        format!("/{}", route)
    }
}

/// Normalise protocol versions to the `HTTP/x.y` form.
pub fn format_http_protocol_version(version: &str) -> String {
    let upper = version.to_ascii_uppercase();
    if upper.starts_with("HTTP/") {
        upper
    } else {
        format!("HTTP/{}", version)
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use serde_json::json;

    use super::super::config::Config;
    use super::super::errors::Result;
    use super::super::metrics::RuntimeCollector;
    use super::super::report::Reporter;
    use super::super::span::FinishedSpan;
    use super::super::span::Kind;
    use super::super::tags;

    use super::Tracer;


    #[derive(Clone, Default)]
    struct RecordingReporter {
        batches: Arc<Mutex<Vec<Vec<FinishedSpan>>>>,
    }

    impl RecordingReporter {
        fn spans(&self) -> Vec<FinishedSpan> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, spans: &[FinishedSpan]) -> Result<()> {
            self.batches.lock().unwrap().push(spans.to_vec());
            Ok(())
        }
    }

    fn sampled_config() -> Config {
        Config {
            sample_rate: 1.0,
            ..Config::default()
        }
    }

    fn make_tracer(config: Config) -> (Tracer, RecordingReporter) {
        let reporter = RecordingReporter::default();
        let tracer = Tracer::new(&config, Box::new(reporter.clone()));
        (tracer, reporter)
    }


    mod lifecycle {
        use std::thread;
        use std::time::Duration;

        use super::make_tracer;
        use super::sampled_config;
        use super::Kind;

        #[test]
        fn duration_tracks_wall_clock() {
            let (mut tracer, reporter) = make_tracer(sampled_config());
            let span = tracer.start_span("timed", None);
            thread::sleep(Duration::from_millis(10));
            tracer.finish(span);
            tracer.flush();
            let spans = reporter.spans();
            assert!(spans[0].duration_micros() >= 5_000);
            assert!(spans[0].duration_micros() < 60_000_000);
        }

        #[test]
        fn nested_spans_link_and_balance() {
            let (mut tracer, reporter) = make_tracer(sampled_config());
            let root = tracer.start_span("root", Some(Kind::Server));
            let child = tracer.start_span("child", Some(Kind::Client));
            assert_eq!(tracer.stack_depth(), 2);
            assert_eq!(
                child.context().trace_id(),
                root.context().trace_id()
            );
            assert_eq!(
                child.context().parent_id(),
                Some(root.context().span_id())
            );
            tracer.finish(child);
            tracer.finish(root);
            assert_eq!(tracer.stack_depth(), 0);
            tracer.flush();
            assert_eq!(reporter.spans().len(), 2);
        }

        #[test]
        fn out_of_order_finish_pops_positionally() {
            let (mut tracer, _reporter) = make_tracer(sampled_config());
            let first = tracer.start_span("first", None);
            let second = tracer.start_span("second", None);
            tracer.finish(first);
            assert_eq!(tracer.stack_depth(), 1);
            tracer.finish(second);
            assert_eq!(tracer.stack_depth(), 0);
        }

        #[test]
        fn unsampled_spans_are_reported_without_payload() {
            let config = super::Config::default(); // sample_rate 0
            let (mut tracer, reporter) = super::make_tracer(config);
            let span = tracer.start_span("quiet", None);
            assert!(!span.is_sampled());
            tracer.finish(span);
            assert_eq!(tracer.stack_depth(), 0);
            tracer.flush();
            let spans = reporter.spans();
            assert_eq!(spans.len(), 1);
            assert!(spans[0].tags().is_empty());
        }

        #[test]
        fn flush_on_drop() {
            let reporter = super::RecordingReporter::default();
            {
                let mut tracer = super::Tracer::new(
                    &super::sampled_config(),
                    Box::new(reporter.clone()),
                );
                let span = tracer.start_span("late", None);
                tracer.finish(span);
            }
            assert_eq!(reporter.spans().len(), 1);
        }
    }


    mod errors {
        use super::make_tracer;
        use super::sampled_config;
        use super::tags;

        #[test]
        fn error_is_tagged_and_rethrown() {
            let (mut tracer, reporter) = make_tracer(sampled_config());
            let result: Result<(), String> =
                tracer.span("failing", None, |_, _| Err(String::from("boom")));
            assert_eq!(result.unwrap_err(), "boom");
            tracer.flush();
            let spans = reporter.spans();
            assert_eq!(spans[0].tags().get(tags::ERROR).unwrap(), "boom");
        }

        #[test]
        fn unsampled_error_is_rethrown_untagged() {
            let (mut tracer, reporter) = make_tracer(super::Config::default());
            let result: Result<(), String> =
                tracer.span("failing", None, |_, _| Err(String::from("boom")));
            assert_eq!(result.unwrap_err(), "boom");
            tracer.flush();
            assert!(reporter.spans()[0].tags().get(tags::ERROR).is_none());
        }

        #[test]
        fn success_passes_through() {
            let (mut tracer, _reporter) = make_tracer(sampled_config());
            let result: Result<u32, String> =
                tracer.span("ok", None, |_, _| Ok(42));
            assert_eq!(result.unwrap(), 42);
        }
    }


    mod tagging {
        use super::json;
        use super::make_tracer;
        use super::sampled_config;

        #[test]
        fn non_scalar_coerces_to_empty_string() {
            let (mut tracer, reporter) = make_tracer(sampled_config());
            let mut span = tracer.start_span("tagged", None);
            tracer.tag(&mut span, "payload", json!({"nested": [1, 2]}));
            tracer.finish(span);
            tracer.flush();
            assert_eq!(reporter.spans()[0].tags().get("payload").unwrap(), "");
        }

        #[test]
        fn runtime_tags_on_sampled_spans() {
            let (mut tracer, reporter) = make_tracer(sampled_config());
            let span = tracer.start_span("tagged", None);
            tracer.finish(span);
            tracer.flush();
            let spans = reporter.spans();
            assert!(spans[0].tags().get(super::tags::RUNTIME_OS).is_some());
            assert!(spans[0]
                .tags()
                .get(super::tags::RUNTIME_MEMORY)
                .is_some());
        }
    }


    mod enrichment {
        use std::sync::Arc;

        use super::sampled_config;
        use super::RecordingReporter;
        use super::RuntimeCollector;
        use super::Tracer;

        #[test]
        fn deltas_cover_only_the_span_window() {
            let collector = Arc::new(RuntimeCollector::new());
            let reporter = RecordingReporter::default();
            let mut tracer = Tracer::with_collector(
                &sampled_config(),
                Box::new(reporter.clone()),
                collector.clone(),
            );

            // Work done before the span must not be attributed to it.
            collector.record_query("mysql.default", 5.0);

            let span = tracer.start_span("window", None);
            collector.record_query("mysql.default", 2.0);
            collector.record_query("mysql.default", 3.0);
            collector.record_command("redis.cache", 0.5);
            tracer.finish(span);
            tracer.flush();

            let spans = reporter.spans();
            let tags = spans[0].tags();
            assert_eq!(tags.get("db.query.times.mysql.default").unwrap(), "2");
            assert_eq!(
                tags.get("db.query.total.duration.mysql.default").unwrap(),
                "5ms"
            );
            assert_eq!(tags.get("cache.exec.times.redis.cache").unwrap(), "1");
        }
    }


    mod inbound {
        use std::collections::HashMap;

        use super::make_tracer;
        use super::sampled_config;

        #[test]
        fn root_span_continues_extracted_context() {
            let mut carrier: HashMap<String, String> = HashMap::new();
            carrier.insert(
                String::from("x-b3-traceid"),
                String::from("463ac35c9f6413ad48485a3953bb6124"),
            );
            carrier.insert(
                String::from("x-b3-spanid"),
                String::from("0020000000000001"),
            );
            carrier.insert(String::from("x-b3-sampled"), String::from("1"));

            let (mut tracer, _reporter) = make_tracer(sampled_config());
            tracer.set_inbound(&carrier);
            let span = tracer.start_span("inbound", None);
            assert_eq!(
                span.context().trace_id(),
                0x463ac35c9f6413ad48485a3953bb6124
            );
            assert_eq!(span.context().parent_id(), Some(0x0020000000000001));
            assert!(span.is_sampled());
            tracer.finish(span);
        }

        #[test]
        fn flags_only_inbound_starts_a_new_trace() {
            let mut carrier: HashMap<String, String> = HashMap::new();
            carrier.insert(String::from("x-b3-sampled"), String::from("0"));

            let (mut tracer, _reporter) = make_tracer(sampled_config());
            tracer.set_inbound(&carrier);
            let span = tracer.start_span("inbound", None);
            assert!(span.context().parent_id().is_none());
            // The upstream decision wins over the local sampler.
            assert!(!span.is_sampled());
            tracer.finish(span);
        }
    }


    mod formatting {
        use super::super::format_http_path;
        use super::super::format_http_protocol_version;
        use super::super::format_route_path;
        use super::make_tracer;
        use super::sampled_config;

        #[test]
        fn body_truncated_at_configured_size() {
            let (tracer, _reporter) = make_tracer(sampled_config());
            let body = "a".repeat(6000);
            let formatted = tracer.format_http_body(&body, Some(6000));
            assert_eq!(formatted.len(), 5004);
            assert!(formatted.ends_with(" ..."));
            assert_eq!(&formatted[..5000], "a".repeat(5000).as_str());
        }

        #[test]
        fn short_body_passes_through() {
            let (tracer, _reporter) = make_tracer(sampled_config());
            assert_eq!(tracer.format_http_body("hello", None), "hello");
        }

        #[test]
        fn numeric_path_segments_become_placeholders() {
            assert_eq!(format_http_path("/users/123"), "/users/{id}");
            assert_eq!(format_http_path("/users/123/orders"), "/users/{id}/orders");
            assert_eq!(format_http_path("/users/abc"), "/users/abc");
            assert_eq!(format_http_path("/users/123/orders/456"), "/users/{id}/orders/{id}");
        }

        #[test]
        fn route_gets_leading_slash() {
            assert_eq!(format_route_path("users/{id}"), "/users/{id}");
            assert_eq!(format_route_path("/users"), "/users");
        }

        #[test]
        fn protocol_version_is_normalised() {
            assert_eq!(format_http_protocol_version("1.1"), "HTTP/1.1");
            assert_eq!(format_http_protocol_version("http/2"), "HTTP/2");
            assert_eq!(format_http_protocol_version("HTTP/1.0"), "HTTP/1.0");
        }
    }
}
