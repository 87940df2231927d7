use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// HS256 bearer tokens signed with the configured token key.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(token_key: &str, ttl: Duration) -> Self {
        let secret = Zeroizing::new(token_key.as_bytes().to_vec());
        Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(
        &self,
        user_id: Uuid,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            exp: now.saturating_add(ttl),
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn validate(
        &self,
        token: &str,
    ) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_validate() {
        let tokens = TokenService::new("k".repeat(32).as_str(), Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        let token = tokens.issue(user_id).unwrap();
        let claims = tokens.validate(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tokens_from_another_key_are_rejected() {
        let ours = TokenService::new("ours-ours-ours-ours", Duration::from_secs(60));
        let theirs = TokenService::new("theirs-theirs-theirs", Duration::from_secs(60));
        let token = theirs.issue(Uuid::new_v4()).unwrap();
        assert!(ours.validate(&token).is_err());
        assert!(ours.validate("not-a-token").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = TokenService::new("key-key-key-key", Duration::from_secs(60));
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            exp: now - 3600,
            iat: now - 7200,
            jti: Uuid::new_v4().to_string(),
        };
        let token =
            encode(&Header::new(Algorithm::HS256), &claims, &tokens.encoding)
                .unwrap();
        assert!(tokens.validate(&token).is_err());
    }
}
