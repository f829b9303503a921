use std::collections::HashSet;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AppError;

const SECONDS_PER_HOUR: i64 = 60 * 60;
const ARGON2_PREFIX: &str = "$argon2";

/// Hash a plaintext password as an unsalted SHA-256 hex digest.
///
/// This is the format every existing user record carries. It is fast and
/// unsalted; see [`hash_password_argon2`] for the stronger format.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Hash a plaintext password using Argon2id.
pub fn hash_password_argon2(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|ph| ph.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
}

/// Verify a plaintext password against a stored hash.
///
/// PHC strings starting with `$argon2` are checked with Argon2, anything else
/// is treated as a SHA-256 hex digest. A stored hash that cannot be parsed
/// verifies as `false`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if stored_hash.starts_with(ARGON2_PREFIX) {
        return match PasswordHash::new(stored_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                debug!(error = %e, "stored argon2 hash is malformed");
                false
            }
        };
    }
    constant_time_eq(stored_hash.as_bytes(), hash_password(password).as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Payload carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token plus the lifetime reported to the client.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
    pub expires_in: i64,
}

/// Issue an HS256 token for `username`, valid for `lifetime_hours` from `now`.
pub fn issue_token(
    secret: &str,
    username: &str,
    lifetime_hours: u32,
    now: i64,
) -> Result<IssuedToken, AppError> {
    let expires_in = i64::from(lifetime_hours) * SECONDS_PER_HOUR;
    let claims = Claims {
        username: username.to_owned(),
        iat: now,
        exp: now
            .checked_add(expires_in)
            .ok_or_else(|| AppError::Internal("expiration overflow".to_string()))?,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign JWT: {e}")))?;
    Ok(IssuedToken {
        token,
        claims,
        expires_in,
    })
}

/// Check signature and expiry of `token` at time `now`.
///
/// A token is accepted only while `now < exp`. Signature and expiry failures
/// are reported the same way so callers cannot tell them apart.
pub fn validate_token(secret: &str, token: &str, now: i64) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // expiry is checked below against the caller's clock, with no leeway
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::from(["exp".to_string()]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!(error = %e, "token rejected");
        AppError::Unauthorized("Invalid or expired token")
    })?
    .claims;

    if now >= claims.exp {
        debug!(username = %claims.username, exp = claims.exp, now, "token expired");
        return Err(AppError::Unauthorized("Invalid or expired token"));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn legacy_hash_matches_known_digest() {
        assert_eq!(
            hash_password("pw1"),
            "c592df4a86933b92addc9842402ddf198c638ea9be58916ee6e3734e1e3152f8"
        );
        assert!(verify_password("pw1", &hash_password("pw1")));
        assert!(!verify_password("pw2", &hash_password("pw1")));
        assert!(!verify_password("pw1", ""));
    }

    #[test]
    fn argon2_hash_and_verify() {
        let hash = hash_password_argon2("super-secret").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("super-secret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("super-secret", "$argon2id$garbage"));
    }

    #[test]
    fn issued_token_round_trips() {
        let issued = issue_token("secret", "alice", 24, NOW).expect("token");
        assert_eq!(issued.expires_in, 86_400);
        assert_eq!(issued.claims.exp, issued.claims.iat + 86_400);

        let claims = validate_token("secret", &issued.token, NOW + 1).expect("valid");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iat, NOW);
    }

    #[test]
    fn token_expires_exactly_at_exp() {
        let issued = issue_token("secret", "alice", 1, NOW).expect("token");
        let exp = issued.claims.exp;
        assert!(validate_token("secret", &issued.token, exp - 1).is_ok());
        assert!(matches!(
            validate_token("secret", &issued.token, exp),
            Err(AppError::Unauthorized("Invalid or expired token"))
        ));
    }

    #[test]
    fn wrong_secret_and_tampering_are_rejected() {
        let issued = issue_token("secret", "alice", 1, NOW).expect("token");
        assert!(validate_token("other", &issued.token, NOW).is_err());

        // bob's signature on alice's payload
        let bob = issue_token("secret", "bob", 1, NOW).expect("token");
        let (alice_unsigned, _) = issued.token.rsplit_once('.').expect("three parts");
        let (_, bob_signature) = bob.token.rsplit_once('.').expect("three parts");
        let spliced = format!("{alice_unsigned}.{bob_signature}");
        assert!(validate_token("secret", &spliced, NOW).is_err());
        assert!(validate_token("secret", "not-a-jwt", NOW).is_err());
    }
}
