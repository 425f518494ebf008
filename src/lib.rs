mod carrier;
mod client;
mod config;
mod context;
mod errors;
mod index;
mod metrics;
mod propagation;
mod queue;
mod relay;
mod report;
mod sampler;
mod span;
mod tracer;

pub mod tags;


pub use self::carrier::MapCarrier;

pub use self::client::TracedClient;

pub use self::config::Config;
pub use self::config::ReportMode;

pub use self::context::SamplingFlags;
pub use self::context::TraceContext;

pub use self::errors::Error;
pub use self::errors::Result;

pub use self::index::ElasticIndex;
pub use self::index::SpanIndex;

pub use self::metrics::MetricsCollector;
pub use self::metrics::MetricsSnapshot;
pub use self::metrics::NullCollector;
pub use self::metrics::RuntimeCollector;

pub use self::propagation::extract;
pub use self::propagation::inject;
pub use self::propagation::Extraction;

pub use self::queue::FileQueue;
pub use self::queue::MemoryQueue;
pub use self::queue::SpanQueue;

pub use self::relay::index_document;
pub use self::relay::index_name;
pub use self::relay::RelayConsumer;

pub use self::report::CollectorSink;
pub use self::report::HttpCollector;
pub use self::report::HttpReporter;
pub use self::report::QueueReporter;
pub use self::report::Reporter;
pub use self::report::ThreadReporter;

pub use self::sampler::SampleDecision;
pub use self::sampler::Sampler;

pub use self::span::Endpoint;
pub use self::span::FinishedSpan;
pub use self::span::Kind;
pub use self::span::Span;
pub use self::span::tag::SpanTags;
pub use self::span::tag::TagValue;

pub use self::tracer::format_http_path;
pub use self::tracer::format_http_protocol_version;
pub use self::tracer::format_route_path;
pub use self::tracer::Tracer;
