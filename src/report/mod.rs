use serde_json::Value;

use crate::errors::Result;
use crate::span::FinishedSpan;

mod http;
mod queue;
mod thread;

pub use self::http::HttpCollector;
pub use self::http::HttpReporter;
pub use self::queue::QueueReporter;
pub use self::thread::ThreadReporter;


/// Sink for batches of finished spans.
///
/// Reporting is best effort: implementations must never block the caller
/// on delivery success, and callers log and swallow any returned error so
/// a reporting failure cannot break instrumented business logic.
pub trait Reporter: Send {
    fn report(&self, spans: &[FinishedSpan]) -> Result<()>;
}


/// Forwarder of already-encoded span documents to the collector.
///
/// Used by the relay, which handles documents rather than live spans.
pub trait CollectorSink: Send {
    fn forward(&self, spans: &[Value]) -> Result<()>;
}
