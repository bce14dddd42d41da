//! UGIN Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the UGIN service:
//! - Post records and their listing allow-lists
//! - Account records for the credential store
//! - Common error types
//! - Store traits implemented by the storage backends
//! - Listing query builder
//! - Configuration management

pub mod config;
pub mod listing;

pub use config::{
    AdminConfig, AppConfig, AuthConfig, ConfigError, DatabaseConfig, ListingConfig,
    LoggingConfig, ServerConfig,
};
pub use listing::{ListingPage, ListingParams, ListingPolicy, ListingQuery, SearchFilter, SortOrder};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for UGIN operations
#[derive(Error, Debug)]
pub enum UginError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Store operation exceeded its deadline")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, UginError>;

// ============================================================================
// Post Records
// ============================================================================

/// A post record as owned by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post fields that may be sorted on
pub const POST_SORTABLE_FIELDS: &[&str] = &["id", "name", "description", "created_at", "updated_at"];

/// Post fields the search term is matched against
pub const POST_SEARCHABLE_FIELDS: &[&str] = &["name", "description"];

/// Primary key of the post table
pub const POST_PRIMARY_KEY: &str = "id";

/// Typed view of a single post field, used for in-process sorting and matching
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue<'a> {
    Int(i64),
    Text(&'a str),
    Time(DateTime<Utc>),
}

impl Post {
    /// Look up a field by its canonical name
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "id" => Some(FieldValue::Int(self.id)),
            "name" => Some(FieldValue::Text(&self.name)),
            "description" => Some(FieldValue::Text(&self.description)),
            "created_at" => Some(FieldValue::Time(self.created_at)),
            "updated_at" => Some(FieldValue::Time(self.updated_at)),
            _ => None,
        }
    }

    /// Compare two posts on a field, breaking ties by id
    pub fn compare_by(&self, other: &Post, field: &str) -> Ordering {
        self.field(field)
            .cmp(&other.field(field))
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Apply a draft on top of this post, keeping fields the draft leaves out
    pub fn apply(&mut self, draft: PostDraft, now: DateTime<Utc>) {
        if let Some(name) = draft.name {
            self.name = name;
        }
        if let Some(description) = draft.description {
            self.description = description;
        }
        self.updated_at = now;
    }
}

/// Client-supplied post content for create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Accounts
// ============================================================================

/// Account record held by the credential store
///
/// Not `Serialize`: the password hash never leaves the store
/// boundary except through [`Account::public`].
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub identifier: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account record with a fresh id
    pub fn new(identifier: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Projection safe to return to clients
    pub fn public(&self) -> AccountPublic {
        AccountPublic {
            id: self.id,
            identifier: self.identifier.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account view without credential material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPublic {
    pub id: Uuid,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Store Traits
// ============================================================================

/// Record store for posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Run a listing query; counts and page come from one snapshot
    async fn query(&self, query: &ListingQuery) -> Result<ListingPage<Post>>;

    /// Get a post by id
    async fn get(&self, id: i64) -> Result<Post>;

    /// Create a post
    async fn create(&self, draft: PostDraft) -> Result<Post>;

    /// Merge a draft into an existing post
    async fn update(&self, id: i64, draft: PostDraft) -> Result<Post>;

    /// Delete a post by id
    async fn delete(&self, id: i64) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Credential store for accounts
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its unique identifier
    async fn find_by_identifier(&self, identifier: &str) -> Result<Account>;

    /// Create an account; fails with `Conflict` if the identifier is taken
    async fn create(&self, account: Account) -> Result<Account>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
