//! Well-known span tag keys.

pub const ERROR: &str = "error";

pub const HTTP_HOST: &str = "http.host";
pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_PATH: &str = "http.path";
pub const HTTP_QUERY_STRING: &str = "http.query_string";
pub const HTTP_STATUS_CODE: &str = "http.status_code";

pub const HTTP_REQUEST_BODY: &str = "http.request.body";
pub const HTTP_REQUEST_BODY_SIZE: &str = "http.request.body.size";
pub const HTTP_REQUEST_HEADERS: &str = "http.request.headers";
pub const HTTP_REQUEST_PROTOCOL_VERSION: &str = "http.request.protocol.version";
pub const HTTP_REQUEST_SCHEME: &str = "http.request.scheme";

pub const HTTP_RESPONSE_BODY: &str = "http.response.body";
pub const HTTP_RESPONSE_BODY_SIZE: &str = "http.response.body.size";
pub const HTTP_RESPONSE_HEADERS: &str = "http.response.headers";
pub const HTTP_RESPONSE_PROTOCOL_VERSION: &str = "http.response.protocol.version";

pub const RUNTIME_MEMORY: &str = "runtime.memory";
pub const RUNTIME_OS: &str = "runtime.os";
pub const RUNTIME_START_SYSTEM_LOAD: &str = "runtime.start_system_load";
pub const RUNTIME_FINISH_SYSTEM_LOAD: &str = "runtime.finish_system_load";
pub const RUNTIME_TRACER_VERSION: &str = "runtime.tracer.version";

pub const DB_QUERY_TIMES: &str = "db.query.times";
pub const DB_QUERY_TOTAL_DURATION: &str = "db.query.total.duration";
pub const CACHE_EXEC_TIMES: &str = "cache.exec.times";
pub const CACHE_EXEC_TOTAL_DURATION: &str = "cache.exec.total.duration";
