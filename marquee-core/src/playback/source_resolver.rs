//! Last used video source preference.
//!
//! Two kinds of writes compete for the stored preference:
//!
//! - **explicit** writes come from the user picking a source. They always
//!   win and are stamped with server time, ignoring the client clock.
//! - **heartbeat** writes come from the player reporting what it is playing.
//!   They never replace an explicit choice and only replace an older
//!   heartbeat. Client timestamps in the future are clamped to server time.
//!
//! Reads fall back to the most recent watch-history record carrying a
//! recognised source when no preference is stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::ports::{
    SourceWrite, SourceWriteOutcome, UsersRepository, WatchHistoryRepository,
};
use crate::error::{MarqueeError, Result};
use crate::sources::{VideoSource, normalize};

/// How many history rows to scan for a usable fallback source.
const HISTORY_FALLBACK_SCAN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Preference,
    WatchHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSource {
    pub source: VideoSource,
    pub origin: SourceOrigin,
    pub at: Option<DateTime<Utc>>,
    pub explicit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceUpdateOutcome {
    Applied { source: VideoSource, at: DateTime<Utc> },
    Rejected,
}

#[derive(Clone)]
pub struct LastUsedSourceResolver {
    users: Arc<dyn UsersRepository>,
    history: Arc<dyn WatchHistoryRepository>,
}

impl std::fmt::Debug for LastUsedSourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastUsedSourceResolver").finish_non_exhaustive()
    }
}

impl LastUsedSourceResolver {
    pub fn new(
        users: Arc<dyn UsersRepository>,
        history: Arc<dyn WatchHistoryRepository>,
    ) -> Self {
        Self { users, history }
    }

    /// Record that `user_id` used `source`.
    ///
    /// `at` is the client's claim of when the source was used; it only
    /// matters for heartbeats.
    pub async fn update(
        &self,
        user_id: Uuid,
        source: &str,
        at: Option<DateTime<Utc>>,
        explicit: bool,
    ) -> Result<SourceUpdateOutcome> {
        let source = normalize(source)?;
        let now = Utc::now();
        let effective_at = if explicit {
            now
        } else {
            at.map_or(now, |claimed| claimed.min(now))
        };

        let write = SourceWrite {
            source: source.name().to_string(),
            at: effective_at,
            explicit,
        };

        let outcome = match self.users.write_last_used_source(user_id, &write).await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    %user_id,
                    error = %err,
                    "conditional source write failed, retrying as read-modify-save"
                );
                self.read_modify_save(user_id, &write).await?
            }
        };

        match outcome {
            SourceWriteOutcome::Applied => {
                debug!(%user_id, %source, explicit, "last used source updated");
                Ok(SourceUpdateOutcome::Applied {
                    source,
                    at: effective_at,
                })
            }
            SourceWriteOutcome::Rejected => {
                debug!(%user_id, %source, "heartbeat rejected by stored preference");
                Ok(SourceUpdateOutcome::Rejected)
            }
            SourceWriteOutcome::UserMissing => {
                Err(MarqueeError::NotFound(format!("user {user_id}")))
            }
        }
    }

    async fn read_modify_save(
        &self,
        user_id: Uuid,
        write: &SourceWrite,
    ) -> Result<SourceWriteOutcome> {
        let persistence = |err: MarqueeError| {
            MarqueeError::Persistence(format!(
                "failed to store last used source: {err}"
            ))
        };

        let Some(mut user) =
            self.users.get_user_by_id(user_id).await.map_err(persistence)?
        else {
            return Ok(SourceWriteOutcome::UserMissing);
        };

        if !write.may_overwrite(&user) {
            return Ok(SourceWriteOutcome::Rejected);
        }

        write.apply_to(&mut user);
        self.users.update_user(&user).await.map_err(persistence)?;
        Ok(SourceWriteOutcome::Applied)
    }

    /// Source to start playback with, if any is known.
    pub async fn resolve(&self, user_id: Uuid) -> Result<Option<ResolvedSource>> {
        let user = self
            .users
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| MarqueeError::NotFound(format!("user {user_id}")))?;

        if let Some(stored) = user.last_used_source.as_deref() {
            match normalize(stored) {
                Ok(source) => {
                    return Ok(Some(ResolvedSource {
                        source,
                        origin: SourceOrigin::Preference,
                        at: user.last_used_source_at,
                        explicit: user.last_used_source_explicit,
                    }));
                }
                Err(err) => {
                    debug!(%user_id, error = %err, "ignoring stored source");
                }
            }
        }

        let recent = self
            .history
            .recent_with_source(user_id, HISTORY_FALLBACK_SCAN)
            .await?;

        Ok(recent.into_iter().find_map(|entry| {
            let source = normalize(entry.source.as_deref()?).ok()?;
            Some(ResolvedSource {
                source,
                origin: SourceOrigin::WatchHistory,
                at: entry.source_set_at.or(Some(entry.last_watched_at)),
                explicit: false,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::{
        InMemoryUsersRepository, InMemoryWatchHistoryRepository, MemoryStore,
    };
    use crate::database::ports::users::MockUsersRepository;
    use chrono::Duration;
    use marquee_model::{
        AuthProvider, User, WatchHistoryKey, WatchProgressFields,
    };

    struct Fixture {
        resolver: LastUsedSourceResolver,
        users: Arc<InMemoryUsersRepository>,
        history: Arc<InMemoryWatchHistoryRepository>,
        user_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let users = Arc::new(InMemoryUsersRepository::new(store.clone()));
        let history = Arc::new(InMemoryWatchHistoryRepository::new(store));
        let user =
            User::new("viewer@example.com", None, None, AuthProvider::Google);
        users.create_user(&user).await.unwrap();
        Fixture {
            resolver: LastUsedSourceResolver::new(
                users.clone(),
                history.clone(),
            ),
            users,
            history,
            user_id: user.id,
        }
    }

    async fn stored(f: &Fixture) -> Option<String> {
        f.users
            .get_user_by_id(f.user_id)
            .await
            .unwrap()
            .and_then(|u| u.last_used_source)
    }

    #[tokio::test]
    async fn explicit_choice_survives_later_heartbeats() {
        let f = fixture().await;
        let t0 = Utc::now();

        f.resolver
            .update(f.user_id, "vidnest", Some(t0), true)
            .await
            .unwrap();

        let outcome = f
            .resolver
            .update(f.user_id, "vidlink", Some(t0 + Duration::seconds(1)), false)
            .await
            .unwrap();

        assert_eq!(outcome, SourceUpdateOutcome::Rejected);
        assert_eq!(stored(&f).await.as_deref(), Some("vidnest"));
    }

    #[tokio::test]
    async fn heartbeats_with_arbitrary_timestamps_never_win() {
        let f = fixture().await;
        f.resolver
            .update(f.user_id, "videasy", None, true)
            .await
            .unwrap();

        let now = Utc::now();
        for offset in [-3600, 0, 1, 86_400, 10_000_000] {
            f.resolver
                .update(
                    f.user_id,
                    "2",
                    Some(now + Duration::seconds(offset)),
                    false,
                )
                .await
                .unwrap();
        }
        f.resolver.update(f.user_id, "vidsrc", None, false).await.unwrap();

        assert_eq!(stored(&f).await.as_deref(), Some("videasy"));
    }

    #[tokio::test]
    async fn heartbeats_replace_older_heartbeats_only() {
        let f = fixture().await;
        let t0 = Utc::now() - Duration::minutes(10);

        f.resolver
            .update(f.user_id, "vidlink", Some(t0), false)
            .await
            .unwrap();
        let stale = f
            .resolver
            .update(f.user_id, "vidnest", Some(t0 - Duration::minutes(1)), false)
            .await
            .unwrap();
        assert_eq!(stale, SourceUpdateOutcome::Rejected);

        f.resolver
            .update(f.user_id, "vidnest", Some(t0 + Duration::minutes(1)), false)
            .await
            .unwrap();
        assert_eq!(stored(&f).await.as_deref(), Some("vidnest"));
    }

    #[tokio::test]
    async fn future_heartbeats_are_clamped_to_server_time() {
        let f = fixture().await;
        let claimed = Utc::now() + Duration::days(30);

        let outcome = f
            .resolver
            .update(f.user_id, "vidlink", Some(claimed), false)
            .await
            .unwrap();

        let SourceUpdateOutcome::Applied { at, .. } = outcome else {
            panic!("expected heartbeat to apply, got {outcome:?}");
        };
        assert!(at <= Utc::now());
    }

    #[tokio::test]
    async fn explicit_writes_ignore_the_client_clock() {
        let f = fixture().await;
        let claimed = Utc::now() - Duration::days(365);
        let before = Utc::now();

        let outcome = f
            .resolver
            .update(f.user_id, "videasy", Some(claimed), true)
            .await
            .unwrap();

        let SourceUpdateOutcome::Applied { at, .. } = outcome else {
            panic!("expected explicit write to apply");
        };
        assert!(at >= before);
    }

    #[tokio::test]
    async fn unknown_sources_are_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.resolver.update(f.user_id, "7", None, true).await,
            Err(MarqueeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn resolve_normalizes_legacy_ids() {
        let f = fixture().await;
        let mut user = f.users.get_user_by_id(f.user_id).await.unwrap().unwrap();
        user.last_used_source = Some("3".into());
        f.users.update_user(&user).await.unwrap();

        let resolved = f.resolver.resolve(f.user_id).await.unwrap().unwrap();
        assert_eq!(resolved.source, VideoSource::Vidnest);
        assert_eq!(resolved.origin, SourceOrigin::Preference);
    }

    #[tokio::test]
    async fn resolve_falls_back_to_recognised_history() {
        let f = fixture().await;
        let now = Utc::now();
        let with_source = |source: &str| WatchProgressFields {
            source: Some(source.into()),
            ..Default::default()
        };

        f.history
            .upsert(
                &WatchHistoryKey::movie(f.user_id, 1),
                &with_source("1"),
                now - Duration::hours(2),
            )
            .await
            .unwrap();
        f.history
            .upsert(
                &WatchHistoryKey::movie(f.user_id, 2),
                &with_source("mystery-host"),
                now,
            )
            .await
            .unwrap();

        let resolved = f.resolver.resolve(f.user_id).await.unwrap().unwrap();
        assert_eq!(resolved.source, VideoSource::Videasy);
        assert_eq!(resolved.origin, SourceOrigin::WatchHistory);
    }

    #[tokio::test]
    async fn resolve_without_any_signal_is_none() {
        let f = fixture().await;
        assert_eq!(f.resolver.resolve(f.user_id).await.unwrap(), None);
    }

    fn history() -> Arc<InMemoryWatchHistoryRepository> {
        Arc::new(InMemoryWatchHistoryRepository::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn conditional_write_failure_falls_back_to_read_modify_save() {
        let user = User::new("x@y.z", None, None, AuthProvider::Credentials);
        let user_id = user.id;

        let mut users = MockUsersRepository::new();
        users.expect_write_last_used_source().returning(|_, _| {
            Err(MarqueeError::Persistence("operator does not exist".into()))
        });
        users
            .expect_get_user_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update_user()
            .withf(|u| {
                u.last_used_source.as_deref() == Some("vidlink")
                    && u.last_used_source_explicit
            })
            .times(1)
            .returning(|_| Ok(()));

        let resolver = LastUsedSourceResolver::new(Arc::new(users), history());
        let outcome = resolver.update(user_id, "vidlink", None, true).await;
        assert!(matches!(outcome, Ok(SourceUpdateOutcome::Applied { .. })));
    }

    #[tokio::test]
    async fn fallback_respects_the_explicit_flag() {
        let mut user = User::new("x@y.z", None, None, AuthProvider::Credentials);
        user.last_used_source = Some("vidnest".into());
        user.last_used_source_at = Some(Utc::now());
        user.last_used_source_explicit = true;
        let user_id = user.id;

        let mut users = MockUsersRepository::new();
        users
            .expect_write_last_used_source()
            .returning(|_, _| Err(MarqueeError::Persistence("timeout".into())));
        users
            .expect_get_user_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users.expect_update_user().never();

        let resolver = LastUsedSourceResolver::new(Arc::new(users), history());
        let outcome = resolver
            .update(user_id, "vidlink", Some(Utc::now()), false)
            .await
            .unwrap();
        assert_eq!(outcome, SourceUpdateOutcome::Rejected);
    }

    #[tokio::test]
    async fn both_write_paths_failing_surfaces_a_persistence_error() {
        let mut users = MockUsersRepository::new();
        users
            .expect_write_last_used_source()
            .returning(|_, _| Err(MarqueeError::Persistence("down".into())));
        users
            .expect_get_user_by_id()
            .returning(|_| Err(MarqueeError::Persistence("down".into())));

        let resolver = LastUsedSourceResolver::new(Arc::new(users), history());
        assert!(matches!(
            resolver.update(Uuid::new_v4(), "videasy", None, true).await,
            Err(MarqueeError::Persistence(_))
        ));
    }
}
