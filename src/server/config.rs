use super::RequestsLoggingLevel;
use chrono::{FixedOffset, Offset, Utc};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Timezone dates and times are rendered in unless a request asks otherwise.
    pub display_offset: FixedOffset,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3002,
            metrics_port: 9092,
            display_offset: Utc.fix(),
        }
    }
}
