use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Key of the singleton settings record.
pub const SETTINGS_KEY: &str = "app_settings";

/// Application-wide switches. There is exactly one record, created lazily.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct AppSettings {
    pub key: String,
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            key: SETTINGS_KEY.to_string(),
            maintenance_mode: false,
            maintenance_message: None,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }
}
