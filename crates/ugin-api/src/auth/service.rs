//! Authentication service layer
//!
//! Signup, signin, refresh, and token checks composed from the account store,
//! the password hasher, and the token service. Every store call is bounded by
//! the configured deadline and every outcome is written to the audit log.

use super::jwt::{unix_now, TokenKind, TokenService};
use super::password::{hash_password_with_config, verify_password, PasswordConfig};
use crate::audit::{audit_log, AuditEvent, ClientContext};
use crate::error::AppError;
use crate::state::with_deadline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use ugin_core::{Account, AccountPublic, AccountStore, UginError};

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

/// Signin request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigninRequest {
    #[serde(alias = "username", alias = "email")]
    pub identifier: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Signin response with both tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Refresh response; the refresh token itself is not rotated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Token check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub identifier: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<TokenService>,
    passwords: PasswordConfig,
    store_timeout: Duration,
    /// Hash verified against when the identifier is unknown
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<TokenService>,
        passwords: PasswordConfig,
        store_timeout: Duration,
    ) -> Self {
        Self {
            accounts,
            tokens,
            passwords,
            store_timeout,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Create an account; no token is issued
    pub async fn signup(
        &self,
        request: SignupRequest,
        client: &ClientContext,
    ) -> Result<AccountPublic, AppError> {
        let identifier = request.identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(AppError::BadRequest("identifier must not be blank".to_string()));
        }
        if request.password.is_empty() {
            return Err(AppError::BadRequest("password must not be empty".to_string()));
        }

        match with_deadline(self.store_timeout, self.accounts.find_by_identifier(&identifier)).await {
            Ok(_) => {
                audit_log(&AuditEvent::SignupFailure {
                    identifier: identifier.clone(),
                    reason: "identifier taken".to_string(),
                    client: client.clone(),
                });
                return Err(AppError::Conflict(format!("account {identifier} already exists")));
            }
            Err(UginError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let password_hash = hash_blocking(request.password, self.passwords.clone()).await?;

        let created = with_deadline(
            self.store_timeout,
            self.accounts.create(Account::new(identifier.clone(), password_hash)),
        )
        .await;

        match created {
            Ok(account) => {
                audit_log(&AuditEvent::SignupSuccess {
                    identifier,
                    client: client.clone(),
                });
                Ok(account.public())
            }
            Err(e) => {
                audit_log(&AuditEvent::SignupFailure {
                    identifier,
                    reason: e.to_string(),
                    client: client.clone(),
                });
                Err(e.into())
            }
        }
    }

    /// Check credentials and issue an access and a refresh token
    ///
    /// Unknown identifiers and wrong passwords fail identically.
    pub async fn signin(
        &self,
        request: SigninRequest,
        client: &ClientContext,
    ) -> Result<AuthResponse, AppError> {
        let identifier = request.identifier.trim().to_string();

        let account =
            match with_deadline(self.store_timeout, self.accounts.find_by_identifier(&identifier)).await {
                Ok(account) => account,
                Err(UginError::NotFound(_)) => {
                    // Same Argon2 cost as a real mismatch
                    let decoy = self.decoy_hash().await?.to_string();
                    verify_blocking(request.password, decoy).await?;
                    self.signin_failed(&identifier, "unknown identifier", client);
                    return Err(AppError::InvalidCredentials);
                }
                Err(e) => return Err(e.into()),
            };

        let matches = verify_blocking(request.password, account.password_hash.clone()).await?;

        if !matches {
            self.signin_failed(&identifier, "password mismatch", client);
            return Err(AppError::InvalidCredentials);
        }

        let now = unix_now();
        let access = self.tokens.issue(&account.identifier, TokenKind::Access, now)?;
        let refresh = self.tokens.issue(&account.identifier, TokenKind::Refresh, now)?;

        audit_log(&AuditEvent::SigninSuccess {
            identifier: account.identifier,
            client: client.clone(),
        });

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl(TokenKind::Access),
        })
    }

    async fn decoy_hash(&self) -> Result<&str, AppError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| {
                hash_blocking("ugin-decoy-password".to_string(), self.passwords.clone())
            })
            .await?;
        Ok(hash.as_str())
    }

    fn signin_failed(&self, identifier: &str, reason: &str, client: &ClientContext) {
        audit_log(&AuditEvent::SigninFailure {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
            client: client.clone(),
        });
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        client: &ClientContext,
    ) -> Result<RefreshResponse, AppError> {
        let now = unix_now();
        let claims = self
            .tokens
            .validate_kind(&request.refresh_token, TokenKind::Refresh, now)
            .map_err(|e| {
                audit_log(&AuditEvent::InvalidToken {
                    reason: e.to_string(),
                    client: client.clone(),
                });
                AppError::InvalidToken
            })?;

        let access = self.tokens.issue(&claims.sub, TokenKind::Access, now)?;

        audit_log(&AuditEvent::TokenRefresh {
            identifier: claims.sub,
            client: client.clone(),
        });

        Ok(RefreshResponse {
            access_token: access.token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl(TokenKind::Access),
        })
    }

    /// Resolve an access token to its account identifier
    pub fn check(&self, token: &str, client: &ClientContext) -> Result<CheckResponse, AppError> {
        let claims = self
            .tokens
            .validate_kind(token, TokenKind::Access, unix_now())
            .map_err(|e| {
                audit_log(&AuditEvent::InvalidToken {
                    reason: e.to_string(),
                    client: client.clone(),
                });
                AppError::InvalidToken
            })?;

        Ok(CheckResponse {
            identifier: claims.sub,
        })
    }
}

async fn hash_blocking(password: String, config: PasswordConfig) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use ugin_store::InMemoryAccountStore;

    fn service() -> AuthService {
        let tokens = TokenService::new(JwtConfig {
            secret: "test-secret-key-that-is-long-enough!!".to_string(),
            issuer: "ugin".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
        });
        AuthService::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(tokens),
            PasswordConfig::minimal(),
            Duration::from_secs(5),
        )
    }

    fn signup(identifier: &str, password: &str) -> SignupRequest {
        SignupRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        }
    }

    fn signin(identifier: &str, password: &str) -> SigninRequest {
        SigninRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_alice_flow() {
        let auth = service();
        let client = ClientContext::default();

        let account = auth.signup(signup("alice", "pw"), &client).await.unwrap();
        assert_eq!(account.identifier, "alice");

        let tokens = auth.signin(signin("alice", "pw"), &client).await.unwrap();
        assert_eq!(tokens.token_type, "Bearer");

        let checked = auth.check(&tokens.access_token, &client).unwrap();
        assert_eq!(checked.identifier, "alice");

        let refreshed = auth
            .refresh(
                RefreshRequest {
                    refresh_token: tokens.refresh_token.clone(),
                },
                &client,
            )
            .await
            .unwrap();
        assert_eq!(
            auth.check(&refreshed.access_token, &client).unwrap().identifier,
            "alice"
        );

        assert!(matches!(
            auth.check(&tokens.refresh_token, &client),
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_double_signup_conflicts() {
        let auth = service();
        let client = ClientContext::default();

        auth.signup(signup("alice", "pw"), &client).await.unwrap();
        let second = auth.signup(signup("alice", "other"), &client).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        // The first password still works
        assert!(auth.signin(signin("alice", "pw"), &client).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_identifier_match() {
        let auth = service();
        let client = ClientContext::default();
        auth.signup(signup("alice", "pw"), &client).await.unwrap();

        let wrong = auth.signin(signin("alice", "nope"), &client).await;
        let unknown = auth.signin(signin("bob", "pw"), &client).await;

        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_identifier_runs_password_verification() {
        let auth = service();
        let client = ClientContext::default();
        assert!(!auth.decoy_hash.initialized());

        let unknown = auth.signin(signin("bob", "pw"), &client).await;
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));

        let decoy = auth.decoy_hash.get().unwrap();
        assert!(decoy.starts_with("$argon2id$"));
        assert!(!verify_password("pw", decoy).unwrap());
    }

    #[tokio::test]
    async fn test_signin_failures_take_comparable_time() {
        let tokens = TokenService::new(JwtConfig {
            secret: "test-secret-key-that-is-long-enough!!".to_string(),
            issuer: "ugin".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
        });
        let auth = AuthService::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(tokens),
            PasswordConfig::default(),
            Duration::from_secs(30),
        );
        let client = ClientContext::default();
        auth.signup(signup("alice", "pw"), &client).await.unwrap();
        // Build the decoy hash before timing
        auth.signin(signin("carol", "pw"), &client).await.unwrap_err();

        let started = std::time::Instant::now();
        auth.signin(signin("alice", "nope"), &client).await.unwrap_err();
        let wrong = started.elapsed();

        let started = std::time::Instant::now();
        auth.signin(signin("bob", "nope"), &client).await.unwrap_err();
        let unknown = started.elapsed();

        assert!(unknown * 10 > wrong, "unknown: {unknown:?}, wrong: {wrong:?}");
    }

    #[tokio::test]
    async fn test_blank_signup_rejected() {
        let auth = service();
        let client = ClientContext::default();

        assert!(matches!(
            auth.signup(signup("   ", "pw"), &client).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            auth.signup(signup("alice", ""), &client).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let auth = service();
        let client = ClientContext::default();
        auth.signup(signup("alice", "pw"), &client).await.unwrap();
        let tokens = auth.signin(signin("alice", "pw"), &client).await.unwrap();

        let result = auth
            .refresh(
                RefreshRequest {
                    refresh_token: tokens.access_token,
                },
                &client,
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_signup_request_accepts_username_alias() {
        let request: SignupRequest =
            serde_json::from_str(r#"{"username":"alice","password":"pw"}"#).unwrap();
        assert_eq!(request.identifier, "alice");
    }
}
