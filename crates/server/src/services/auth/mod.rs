//! Bearer token verification.
//!
//! Identity is owned by an external provider that signs HS256 JWTs with a
//! shared secret. This module only checks tokens and reads their claims; it
//! never issues them.

mod error;

pub use error::AuthError;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use parcel_desk_core::UserId;

use crate::config::AuthConfig;

/// Sign-up details the identity provider echoes back in every token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub room_number: Option<String>,
}

/// Claims read from a user token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity-provider user id.
    pub sub: UserId,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<UserMetadata>,
}

/// Verifies tokens against the shared secret and expected audience.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier from configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Check a raw token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` on a bad signature, wrong audience,
    /// expiry in the past, or a `sub` that is not a UUID.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }

    /// Verify the bearer token carried by a request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` if there is no bearer header, or any
    /// error from [`verify`](Self::verify).
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};
    use secrecy::SecretString;

    use super::*;

    const SECRET: &str = "k9$Qz!7vLp2#Xw8@Rt5^Mn3&Bc6*Hd4%";

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from(SECRET),
            audience: "authenticated".to_owned(),
        }
    }

    fn mint(claims: &Claims, secret: &str) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(aud: &str, exp_offset: i64) -> Claims {
        Claims {
            sub: UserId::generate(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            aud: aud.to_owned(),
            email: Some("jane@hostel.test".to_owned()),
            user_metadata: None,
        }
    }

    #[test]
    fn test_valid_token_round_trips_subject() {
        let verifier = TokenVerifier::new(&config());
        let c = claims("authenticated", 3600);
        let verified = verifier.verify(&mint(&c, SECRET)).unwrap();
        assert_eq!(verified.sub, c.sub);
        assert_eq!(verified.email.as_deref(), Some("jane@hostel.test"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new(&config());
        let token = mint(&claims("authenticated", 3600), "another-signing-key-entirely-0123");
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let verifier = TokenVerifier::new(&config());
        let token = mint(&claims("anon", 3600), SECRET);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new(&config());
        // Well past the default leeway.
        let token = mint(&claims("authenticated", -3600), SECRET);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer   "));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn test_missing_header_is_missing_token() {
        let verifier = TokenVerifier::new(&config());
        assert!(matches!(
            verifier.verify_headers(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }
}
