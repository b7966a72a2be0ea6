use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::config::AuthSettings;

/// Errors that can occur while establishing the caller's identity
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization required")]
    MissingCredential,

    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Token carries no user id")]
    MissingSubject,

    #[error("Auth misconfigured: {0}")]
    Misconfigured(String),
}

/// Verified caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

/// Turns a bearer credential into a verified caller identity
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    user_id: Option<String>,
}

/// JWT-based identity verification
///
/// Accepts HS256 tokens signed with a shared secret or RS256 tokens signed
/// by the identity provider. The caller id is taken from the `user_id`
/// claim, falling back to `sub`.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Verifier for HS256 tokens
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let mut verifier = match settings.algorithm.to_uppercase().as_str() {
            "HS256" => {
                let secret = settings
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AuthError::Misconfigured("auth.secret is required for HS256".into()))?;
                Self::hs256(secret.as_bytes())
            }
            "RS256" => {
                let pem = settings
                    .public_key_pem
                    .as_deref()
                    .ok_or_else(|| AuthError::Misconfigured("auth.public_key_pem is required for RS256".into()))?;
                let mut validation = Validation::new(Algorithm::RS256);
                validation.validate_aud = false;
                Self {
                    key: DecodingKey::from_rsa_pem(pem.as_bytes())?,
                    validation,
                }
            }
            other => {
                return Err(AuthError::Misconfigured(format!("unsupported algorithm {}", other)));
            }
        };

        if let Some(issuer) = &settings.issuer {
            verifier.validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &settings.audience {
            verifier.validation.set_audience(&[audience]);
            verifier.validation.validate_aud = true;
        }

        Ok(verifier)
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        let user_id = data
            .claims
            .user_id
            .or(data.claims.sub)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSubject)?;

        Ok(CallerIdentity { user_id })
    }
}
