//! Configuration for the optimize dispatcher

/// Configuration for [`OptimizeDispatcher`](crate::dispatch::OptimizeDispatcher)
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Log level for frames the converter declines (default: Debug)
    pub declined_level: log::Level,
    /// Whether to update [`DispatchStats`](crate::profiling::DispatchStats) (default: true)
    pub record_stats: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            declined_level: log::Level::Debug,
            record_stats: true,
        }
    }
}
