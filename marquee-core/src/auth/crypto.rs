use argon2::{
    Algorithm, Argon2, Params, ParamsBuilder, Version,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher,
        PasswordVerifier, Salt, SaltString,
    },
};
use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id password hashing with a server-side pepper.
///
/// The pepper is appended to the password before hashing and never stored
/// alongside the hash, so a leaked table alone is not enough to mount an
/// offline attack.
#[derive(Debug)]
pub struct AuthCrypto {
    argon2: Argon2<'static>,
    password_pepper: Zeroizing<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum AuthCryptoError {
    #[error("password pepper must not be empty")]
    EmptyPasswordPepper,
    #[error("invalid Argon2 parameters: {0}")]
    InvalidArgon2Params(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl From<PasswordHashError> for AuthCryptoError {
    fn from(err: PasswordHashError) -> Self {
        AuthCryptoError::PasswordHash(err.to_string())
    }
}

impl AuthCrypto {
    const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
    const DEFAULT_ITERATIONS: u32 = 3;
    const DEFAULT_PARALLELISM: u32 = 1;
    const SALT_LENGTH: usize = Salt::RECOMMENDED_LENGTH;

    pub fn new(password_pepper: impl AsRef<[u8]>) -> Result<Self, AuthCryptoError> {
        Self::with_params(
            password_pepper,
            ParamsBuilder::new()
                .m_cost(Self::DEFAULT_MEMORY_KIB)
                .t_cost(Self::DEFAULT_ITERATIONS)
                .p_cost(Self::DEFAULT_PARALLELISM)
                .output_len(32)
                .build()
                .map_err(|err| {
                    AuthCryptoError::InvalidArgon2Params(err.to_string())
                })?,
        )
    }

    /// Cheap parameters for tests and constrained environments.
    pub fn fast(password_pepper: impl AsRef<[u8]>) -> Result<Self, AuthCryptoError> {
        Self::with_params(
            password_pepper,
            ParamsBuilder::new()
                .m_cost(Params::MIN_M_COST)
                .t_cost(Params::MIN_T_COST)
                .p_cost(Params::MIN_P_COST)
                .build()
                .map_err(|err| {
                    AuthCryptoError::InvalidArgon2Params(err.to_string())
                })?,
        )
    }

    pub fn with_params(
        password_pepper: impl AsRef<[u8]>,
        params: Params,
    ) -> Result<Self, AuthCryptoError> {
        let pepper = password_pepper.as_ref();
        if pepper.is_empty() {
            return Err(AuthCryptoError::EmptyPasswordPepper);
        }

        let argon2 =
            Argon2::new(Algorithm::Argon2id, Version::default(), params);

        Ok(Self {
            argon2,
            password_pepper: Zeroizing::new(pepper.to_vec()),
        })
    }

    fn peppered(&self, password: &str) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(
            password.len() + self.password_pepper.len(),
        ));
        material.extend_from_slice(password.as_bytes());
        material.extend_from_slice(&self.password_pepper);
        material
    }

    /// Hash a password into a PHC string suitable for storage.
    pub fn hash_password(
        &self,
        password: &str,
    ) -> Result<String, AuthCryptoError> {
        let material = self.peppered(password);

        let mut salt_bytes = [0u8; Self::SALT_LENGTH];
        OsRng
            .try_fill_bytes(&mut salt_bytes)
            .map_err(|err| AuthCryptoError::PasswordHash(err.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes)?;
        Ok(self.argon2.hash_password(&material, &salt)?.to_string())
    }

    pub fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AuthCryptoError> {
        let parsed = PasswordHash::new(password_hash)?;
        let material = self.peppered(password);
        Ok(self.argon2.verify_password(&material, &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_passwords_and_verifies() {
        let crypto = AuthCrypto::fast("pepper").unwrap();
        let hash = crypto.hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(crypto.verify_password("correct horse", &hash).unwrap());
        assert!(!crypto.verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn pepper_is_part_of_the_hash() {
        let hash = AuthCrypto::fast("pepper-a")
            .unwrap()
            .hash_password("secret")
            .unwrap();
        let other = AuthCrypto::fast("pepper-b").unwrap();
        assert!(!other.verify_password("secret", &hash).unwrap());
    }

    #[test]
    fn rejects_empty_pepper_and_garbage_hashes() {
        assert!(matches!(
            AuthCrypto::fast(""),
            Err(AuthCryptoError::EmptyPasswordPepper)
        ));
        let crypto = AuthCrypto::fast("pepper").unwrap();
        assert!(crypto.verify_password("x", "not-a-phc-string").is_err());
    }
}
