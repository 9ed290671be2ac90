//! View set configuration.

/// Configuration of a [`DynamicViewSet`](crate::DynamicViewSet).
#[derive(Debug, Clone)]
pub struct ViewSetConfig {
    /// Name of the worker thread that processes commits
    pub worker_name: String,
}

impl ViewSetConfig {
    pub fn named(worker_name: impl Into<String>) -> Self {
        Self {
            worker_name: worker_name.into(),
        }
    }
}

impl Default for ViewSetConfig {
    fn default() -> Self {
        Self {
            worker_name: "live-sync-views".to_string(),
        }
    }
}
