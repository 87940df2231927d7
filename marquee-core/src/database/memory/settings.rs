use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use marquee_model::AppSettings;
use uuid::Uuid;

use super::MemoryStore;
use crate::database::ports::settings::SettingsRepository;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct InMemorySettingsRepository {
    store: Arc<MemoryStore>,
}

impl InMemorySettingsRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get_or_create(&self) -> Result<AppSettings> {
        let mut settings = self.store.settings.write().await;
        Ok(settings.get_or_insert_with(AppSettings::default).clone())
    }

    async fn update_maintenance(
        &self,
        enabled: bool,
        message: Option<String>,
        updated_by: Uuid,
    ) -> Result<AppSettings> {
        let mut settings = self.store.settings.write().await;
        let current = settings.get_or_insert_with(AppSettings::default);
        current.maintenance_mode = enabled;
        current.maintenance_message = message;
        current.updated_at = Utc::now();
        current.updated_by = Some(updated_by);
        Ok(current.clone())
    }
}
