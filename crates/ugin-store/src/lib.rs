//! UGIN Store - Record and credential store backends
//!
//! Implements the `PostStore` and `AccountStore` traits from `ugin-core`:
//! - `memory`: process-local stores guarded by a single lock, used by default
//!   and in tests
//! - `postgres`: PostgreSQL stores backed by SQLx

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryAccountStore, InMemoryPostStore};
pub use postgres::{connect, init_schema, PgAccountStore, PgPostStore};
