use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_model::{User, UserRole};
use uuid::Uuid;

use crate::error::Result;

/// Request to persist a user's last used video source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWrite {
    /// Canonical source name.
    pub source: String,
    /// Effective timestamp. Explicit writes carry server time; heartbeat
    /// writes carry the client-claimed time clamped to server time.
    pub at: DateTime<Utc>,
    pub explicit: bool,
}

impl SourceWrite {
    /// Whether this write may replace what `user` currently stores.
    ///
    /// Explicit writes always win. A heartbeat never replaces an explicit
    /// preference and otherwise only replaces an older one.
    pub fn may_overwrite(&self, user: &User) -> bool {
        if self.explicit {
            return true;
        }
        if user.last_used_source_explicit {
            return false;
        }
        match user.last_used_source_at {
            Some(stored_at) => stored_at < self.at,
            None => true,
        }
    }

    /// Copy this write onto `user`.
    pub fn apply_to(&self, user: &mut User) {
        user.last_used_source = Some(self.source.clone());
        user.last_used_source_at = Some(self.at);
        user.last_used_source_explicit = self.explicit;
        user.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceWriteOutcome {
    Applied,
    /// The stored preference was newer or explicit.
    Rejected,
    UserMissing,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Insert a new account. Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Replace the stored record. Fails with `NotFound` when absent.
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<()>;
    async fn set_image(&self, id: Uuid, image: Option<String>) -> Result<()>;
    async fn delete_user(&self, id: Uuid) -> Result<bool>;

    /// Atomic conditional write of the last used source following
    /// [`SourceWrite::may_overwrite`].
    async fn write_last_used_source(
        &self,
        id: Uuid,
        write: &SourceWrite,
    ) -> Result<SourceWriteOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marquee_model::AuthProvider;

    fn user_with(explicit: bool, at: Option<DateTime<Utc>>) -> User {
        let mut user =
            User::new("a@b.c", None, None, AuthProvider::Credentials);
        user.last_used_source = Some("vidnest".into());
        user.last_used_source_at = at;
        user.last_used_source_explicit = explicit;
        user
    }

    fn heartbeat(at: DateTime<Utc>) -> SourceWrite {
        SourceWrite {
            source: "vidlink".into(),
            at,
            explicit: false,
        }
    }

    #[test]
    fn heartbeat_never_beats_explicit() {
        let t0 = Utc::now();
        let user = user_with(true, Some(t0));
        assert!(!heartbeat(t0 + Duration::days(365)).may_overwrite(&user));
    }

    #[test]
    fn heartbeat_needs_a_strictly_newer_timestamp() {
        let t0 = Utc::now();
        let user = user_with(false, Some(t0));
        assert!(!heartbeat(t0).may_overwrite(&user));
        assert!(!heartbeat(t0 - Duration::seconds(1)).may_overwrite(&user));
        assert!(heartbeat(t0 + Duration::seconds(1)).may_overwrite(&user));
    }

    #[test]
    fn anything_fills_an_empty_preference() {
        let user = user_with(false, None);
        assert!(heartbeat(Utc::now()).may_overwrite(&user));
    }

    #[test]
    fn explicit_always_applies() {
        let t0 = Utc::now();
        let mut user = user_with(true, Some(t0));
        let write = SourceWrite {
            source: "videasy".into(),
            at: t0 - Duration::seconds(5),
            explicit: true,
        };
        assert!(write.may_overwrite(&user));
        write.apply_to(&mut user);
        assert_eq!(user.last_used_source.as_deref(), Some("videasy"));
        assert!(user.last_used_source_explicit);
    }
}
