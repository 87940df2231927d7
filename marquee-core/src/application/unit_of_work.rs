use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::database::memory::{
    InMemoryFoldersRepository, InMemorySettingsRepository,
    InMemoryUsersRepository, InMemoryVisitorLogRepository,
    InMemoryWatchHistoryRepository, InMemoryWatchlistRepository, MemoryStore,
};
use crate::database::ports::{
    FoldersRepository, SettingsRepository, UsersRepository,
    VisitorLogRepository, WatchHistoryRepository, WatchlistRepository,
};
#[cfg(feature = "database")]
use crate::database::postgres::{
    PostgresDatabase, PostgresFoldersRepository, PostgresSettingsRepository,
    PostgresUsersRepository, PostgresVisitorLogRepository,
    PostgresWatchHistoryRepository, PostgresWatchlistRepository,
};

/// Aggregates all repository ports used by application services.
#[derive(Clone)]
pub struct AppUnitOfWork {
    pub users: Arc<dyn UsersRepository>,
    pub watch_history: Arc<dyn WatchHistoryRepository>,
    pub watchlist: Arc<dyn WatchlistRepository>,
    pub folders: Arc<dyn FoldersRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub visitor_logs: Arc<dyn VisitorLogRepository>,
}

impl fmt::Debug for AppUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppUnitOfWork")
            .field("users", &type_name_of_val(self.users.as_ref()))
            .field(
                "watch_history",
                &type_name_of_val(self.watch_history.as_ref()),
            )
            .field("watchlist", &type_name_of_val(self.watchlist.as_ref()))
            .field("folders", &type_name_of_val(self.folders.as_ref()))
            .field("settings", &type_name_of_val(self.settings.as_ref()))
            .field(
                "visitor_logs",
                &type_name_of_val(self.visitor_logs.as_ref()),
            )
            .finish()
    }
}

impl AppUnitOfWork {
    /// Repositories over one shared in-memory store. Nothing survives a
    /// restart.
    pub fn in_memory() -> Self {
        Self::from_memory_store(MemoryStore::new())
    }

    pub fn from_memory_store(store: Arc<MemoryStore>) -> Self {
        Self {
            users: Arc::new(InMemoryUsersRepository::new(store.clone())),
            watch_history: Arc::new(InMemoryWatchHistoryRepository::new(
                store.clone(),
            )),
            watchlist: Arc::new(InMemoryWatchlistRepository::new(
                store.clone(),
            )),
            folders: Arc::new(InMemoryFoldersRepository::new(store.clone())),
            settings: Arc::new(InMemorySettingsRepository::new(store.clone())),
            visitor_logs: Arc::new(InMemoryVisitorLogRepository::new(store)),
        }
    }

    #[cfg(feature = "database")]
    #[cfg_attr(docsrs, doc(cfg(feature = "database")))]
    pub fn from_postgres(db: &PostgresDatabase) -> Self {
        let pool = db.pool().clone();

        let users: Arc<dyn UsersRepository> =
            Arc::new(PostgresUsersRepository::new(pool.clone()));
        let watch_history: Arc<dyn WatchHistoryRepository> =
            Arc::new(PostgresWatchHistoryRepository::new(pool.clone()));
        let watchlist: Arc<dyn WatchlistRepository> =
            Arc::new(PostgresWatchlistRepository::new(pool.clone()));
        let folders: Arc<dyn FoldersRepository> =
            Arc::new(PostgresFoldersRepository::new(pool.clone()));
        let settings: Arc<dyn SettingsRepository> =
            Arc::new(PostgresSettingsRepository::new(pool.clone()));
        let visitor_logs: Arc<dyn VisitorLogRepository> =
            Arc::new(PostgresVisitorLogRepository::new(pool));

        Self {
            users,
            watch_history,
            watchlist,
            folders,
            settings,
            visitor_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_model::{AuthProvider, User, WatchHistoryKey};

    #[tokio::test]
    async fn in_memory_repositories_share_one_store() {
        let uow = AppUnitOfWork::in_memory();
        let user = User::new("viewer@example.com", None, None, AuthProvider::Credentials);
        uow.users.create_user(&user).await.unwrap();
        uow.watch_history
            .upsert(
                &WatchHistoryKey::movie(user.id, 550),
                &Default::default(),
                chrono::Utc::now(),
            )
            .await
            .unwrap();

        assert!(uow.users.delete_user(user.id).await.unwrap());
        assert!(
            uow.watch_history
                .list_for_user(user.id, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn debug_names_the_adapters() {
        let rendered = format!("{:?}", AppUnitOfWork::in_memory());
        assert!(rendered.contains("AppUnitOfWork"));
        assert!(rendered.contains("visitor_logs"));
    }
}
