use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiClient, ApiError};
use crate::config::AppConfig;
use crate::tracker::JobTracker;
use crate::transport::WsTransport;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub api: Arc<ApiClient>,
    pub tracker: JobTracker,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api_url, config.auth_token.clone())?;
        let tracker = JobTracker::with_settings(
            Arc::new(WsTransport),
            Duration::from_secs(config.keepalive_secs),
            config.event_log_limit,
        );

        Ok(Self {
            config: Arc::new(config),
            api: Arc::new(api),
            tracker,
        })
    }
}
