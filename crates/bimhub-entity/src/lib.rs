//! # bimhub-entity
//!
//! Domain entities for BimHub. The `store` module holds the records kept
//! in the object database, `model` holds the in-memory model produced by
//! downloads, `download` holds the request fingerprint, and `action`
//! holds the polling snapshot of long-running actions.

pub mod action;
pub mod download;
pub mod model;
pub mod store;
