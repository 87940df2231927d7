use async_trait::async_trait;
use marquee_model::AppSettings;
use uuid::Uuid;

use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load the singleton, creating it with defaults on first access.
    async fn get_or_create(&self) -> Result<AppSettings>;

    async fn update_maintenance(
        &self,
        enabled: bool,
        message: Option<String>,
        updated_by: Uuid,
    ) -> Result<AppSettings>;
}
