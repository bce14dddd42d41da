//! Security audit logging for authentication events
//!
//! Every signup, signin, refresh, rejected token, and denied admin request is
//! logged at INFO level on the "audit" target so it can be routed separately
//! from application logs. The client-facing error for these events is kept
//! generic; the real reason only appears here.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account created
    SignupSuccess {
        identifier: String,
        client: ClientContext,
    },

    /// Account creation refused
    SignupFailure {
        identifier: String,
        reason: String,
        client: ClientContext,
    },

    /// Tokens issued after a password check
    SigninSuccess {
        identifier: String,
        client: ClientContext,
    },

    /// Signin refused; `reason` distinguishes unknown account from bad password
    SigninFailure {
        identifier: String,
        reason: String,
        client: ClientContext,
    },

    /// Access token re-issued from a refresh token
    TokenRefresh {
        identifier: String,
        client: ClientContext,
    },

    /// Invalid, expired, or wrong-kind token presented
    InvalidToken {
        reason: String,
        client: ClientContext,
    },

    /// Request refused by an access check
    AccessDenied {
        resource: String,
        principal: Option<String>,
        client: ClientContext,
    },
}

impl AuditEvent {
    fn summary(&self) -> (&'static str, Option<&str>) {
        match self {
            AuditEvent::SignupSuccess { identifier, .. } => ("Signup successful", Some(identifier.as_str())),
            AuditEvent::SignupFailure { identifier, .. } => ("Signup failed", Some(identifier.as_str())),
            AuditEvent::SigninSuccess { identifier, .. } => ("Signin successful", Some(identifier.as_str())),
            AuditEvent::SigninFailure { identifier, .. } => ("Signin failed", Some(identifier.as_str())),
            AuditEvent::TokenRefresh { identifier, .. } => ("Token refresh", Some(identifier.as_str())),
            AuditEvent::InvalidToken { .. } => ("Invalid token", None),
            AuditEvent::AccessDenied { principal, .. } => ("Access denied", principal.as_deref()),
        }
    }

    fn client(&self) -> &ClientContext {
        match self {
            AuditEvent::SignupSuccess { client, .. }
            | AuditEvent::SignupFailure { client, .. }
            | AuditEvent::SigninSuccess { client, .. }
            | AuditEvent::SigninFailure { client, .. }
            | AuditEvent::TokenRefresh { client, .. }
            | AuditEvent::InvalidToken { client, .. }
            | AuditEvent::AccessDenied { client, .. } => client,
        }
    }
}

/// Client details attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    /// Client IP address (from proxy headers)
    pub ip_address: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Log a security audit event with structured fields
///
/// The full event is also serialized to JSON in the `event` field for log
/// aggregators.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let (summary, identifier) = event.summary();
    let client = event.client();

    info!(
        target: "audit",
        timestamp = %timestamp,
        event = %event_json,
        identifier = ?identifier,
        ip_address = ?client.ip_address,
        user_agent = ?client.user_agent,
        "{summary}"
    );
}

/// Extract client IP address from request headers
///
/// Checks `X-Forwarded-For` (first hop) then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::SigninFailure {
            identifier: "alice".to_string(),
            reason: "password mismatch".to_string(),
            client: ClientContext {
                ip_address: Some("192.168.1.1".to_string()),
                user_agent: None,
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("signin_failure"));
        assert!(json.contains("password mismatch"));
        assert!(json.contains("192.168.1.1"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::InvalidToken {
            reason: "expired".to_string(),
            client: ClientContext::default(),
        });
        audit_log(&AuditEvent::AccessDenied {
            resource: "/admin/dashboard".to_string(),
            principal: Some("mallory".to_string()),
            client: ClientContext::default(),
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.1, 198.51.100.1".parse().unwrap());
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());
        assert_eq!(extract_ip_address(&headers), Some("203.0.113.1".to_string()));
    }

    #[test]
    fn test_client_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "curl/8.0".parse().unwrap());
        let client = ClientContext::from_headers(&headers);
        assert_eq!(client.ip_address, None);
        assert_eq!(client.user_agent, Some("curl/8.0".to_string()));
    }
}
