//! Authentication and authorization
//!
//! - Token issuing and validation (access and refresh kinds)
//! - Password hashing with Argon2
//! - Identity middleware for public, token-gated, and admin routes
//! - Signup/signin/refresh/check orchestration

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{require_kind, Claims, IssuedToken, JwtConfig, TokenError, TokenKind, TokenService};
pub use middleware::{
    admin_basic_auth, anonymous_identity, auth_middleware, bearer_token, AdminUser, AuthError,
    Identity,
};
pub use password::{hash_password, hash_password_with_config, verify_password, PasswordConfig};
pub use service::{
    AuthResponse, AuthService, CheckResponse, RefreshRequest, RefreshResponse, SigninRequest,
    SignupRequest,
};
