use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use helios_core::{OrganizationId, UserId};

use crate::error::AuthError;

/// Session token claims (transport-agnostic).
///
/// This is the minimal set of claims Helios expects once a session token has
/// been decoded/verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    /// Organization context for the session.
    pub organization_id: OrganizationId,

    /// Email of the authenticated user.
    pub email: String,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Deterministically validate session claims.
///
/// Note: this validates the *claims* only. Signature verification is the
/// validator's concern.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), AuthError> {
    if claims.expires_at <= claims.issued_at {
        return Err(AuthError::InvalidSession(
            "invalid token time window".to_string(),
        ));
    }
    if now < claims.issued_at {
        return Err(AuthError::InvalidSession(
            "token not yet valid".to_string(),
        ));
    }
    if now >= claims.expires_at {
        return Err(AuthError::InvalidSession("token has expired".to_string()));
    }
    Ok(())
}

/// Verifies a session token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError>;
}

/// HS256 session token validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            key: DecodingKey::from_secret(&secret),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        // Time-window checks happen in validate_claims against the caller's
        // clock; the claims carry RFC 3339 timestamps rather than numeric exp.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &validation)
            .map_err(|e| AuthError::InvalidSession(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &str, claims: &SessionClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode jwt")
    }

    fn test_claims(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            organization_id: OrganizationId::new(),
            email: "alice@example.com".to_string(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn valid_token_round_trips() {
        let now = Utc::now();
        let claims = test_claims(now);
        let token = mint("test-secret", &claims);

        let validator = Hs256JwtValidator::new(b"test-secret".to_vec());
        let got = validator.validate(&token, now + Duration::minutes(1)).unwrap();
        assert_eq!(got, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = mint("test-secret", &test_claims(now));

        let validator = Hs256JwtValidator::new(b"other-secret".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn expired_claims_are_rejected() {
        let now = Utc::now();
        let claims = test_claims(now - Duration::hours(1));
        let token = mint("test-secret", &claims);

        let validator = Hs256JwtValidator::new(b"test-secret".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(AuthError::InvalidSession(_))
        ));
    }

    #[test]
    fn inverted_time_window_is_rejected() {
        let now = Utc::now();
        let mut claims = test_claims(now);
        claims.expires_at = claims.issued_at - Duration::minutes(1);
        assert!(validate_claims(&claims, now).is_err());
    }
}
