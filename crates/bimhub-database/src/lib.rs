//! # bimhub-database
//!
//! Read-only access to the versioned object store. Defines the
//! [`ObjectDatabase`] / [`DatabaseSession`] traits consumed by download
//! actions, the [`Condition`] subset of the query language, and two
//! backends: an in-memory store used for development and tests, and a
//! PostgreSQL store built on sqlx.

pub mod condition;
pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;
pub mod provider;
pub mod session;

pub use condition::Condition;
pub use connection::DatabasePool;
pub use memory::MemoryObjectDatabase;
pub use postgres::PgObjectDatabase;
pub use provider::open_database;
pub use session::{DatabaseSession, ObjectDatabase};
