use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub page_size: u32,
    pub max_pending_per_target: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub channel_capacity: usize,
    pub resubscribe_debounce_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig {
                base_url: "http://localhost:54321".to_string(),
                api_key: String::new(),
                request_timeout: 30,
            },
            sync: SyncConfig {
                page_size: 30,
                max_pending_per_target: 20,
            },
            realtime: RealtimeConfig {
                channel_capacity: 256,
                resubscribe_debounce_ms: 200,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FLICKER_REMOTE_URL") {
            if !v.trim().is_empty() {
                cfg.remote.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("FLICKER_API_KEY") {
            cfg.remote.api_key = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("FLICKER_REQUEST_TIMEOUT") {
            if let Some(value) = parse_u64(&v) {
                cfg.remote.request_timeout = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("FLICKER_PAGE_SIZE") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.page_size = value.clamp(1, 100);
            }
        }
        if let Ok(v) = std::env::var("FLICKER_MAX_PENDING") {
            if let Some(value) = parse_u32(&v) {
                cfg.sync.max_pending_per_target = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("FLICKER_REALTIME_CAPACITY") {
            if let Some(value) = parse_u64(&v) {
                cfg.realtime.channel_capacity = (value.max(1)) as usize;
            }
        }
        if let Ok(v) = std::env::var("FLICKER_RESUBSCRIBE_DEBOUNCE_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.realtime.resubscribe_debounce_ms = value;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.remote.base_url.trim().is_empty() {
            return Err("Remote base_url must not be empty".to_string());
        }
        if self.remote.request_timeout == 0 {
            return Err("Remote request_timeout must be greater than 0".to_string());
        }
        if self.sync.page_size == 0 {
            return Err("Sync page_size must be greater than 0".to_string());
        }
        if self.sync.max_pending_per_target == 0 {
            return Err("Sync max_pending_per_target must be greater than 0".to_string());
        }
        if self.realtime.channel_capacity == 0 {
            return Err("Realtime channel_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}
