//! JWT token issuing and validation
//!
//! Tokens are HMAC-SHA256 signed and carry the account identifier in `sub`
//! plus a `kind` claim separating access tokens from refresh tokens. The
//! current time is always passed in, so expiry is checked against the
//! caller's clock rather than the library's.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ugin_core::AuthConfig;
use uuid::Uuid;

/// Token kind, embedded in the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account identifier
    pub sub: String,
    /// JWT ID
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration (Unix seconds); the token is valid while `now < exp`
    pub exp: u64,
    pub kind: TokenKind,
}

/// Token errors
///
/// Malformed, tampered, and expired tokens all collapse into `Invalid`.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode JWT: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    Invalid,

    #[error("Expected {expected} token, got {found} token")]
    WrongKind { expected: TokenKind, found: TokenKind },
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Token issuer identifier
    pub issuer: String,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            issuer: config.issuer.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub kind: TokenKind,
    /// Expiration (Unix seconds)
    pub expires_at: u64,
}

/// Current Unix time in seconds
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Signs and validates tokens with one shared secret
pub struct TokenService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        // Expiry is checked against the caller's `now` in `validate`.
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Lifetime in seconds for a token kind
    pub fn ttl(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.config.access_ttl_secs,
            TokenKind::Refresh => self.config.refresh_ttl_secs,
        }
    }

    /// Issue a token for `subject` expiring at `now + ttl(kind)`
    pub fn issue(&self, subject: &str, kind: TokenKind, now: u64) -> Result<IssuedToken, TokenError> {
        let expires_at = now.saturating_add(self.ttl(kind));
        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_at,
            kind,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            kind,
            expires_at,
        })
    }

    /// Verify signature and issuer, then require `now < exp`
    pub fn validate(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if now >= claims.exp {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }

    /// `validate` followed by `require_kind`
    pub fn validate_kind(&self, token: &str, expected: TokenKind, now: u64) -> Result<Claims, TokenError> {
        let claims = self.validate(token, now)?;
        require_kind(&claims, expected)?;
        Ok(claims)
    }
}

/// Fail with `WrongKind` unless the claims carry `expected`
pub fn require_kind(claims: &Claims, expected: TokenKind) -> Result<(), TokenError> {
    if claims.kind == expected {
        Ok(())
    } else {
        Err(TokenError::WrongKind {
            expected,
            found: claims.kind,
        })
    }
}
