//! # bimhub-cache
//!
//! Stores the artifacts of completed downloads so an identical request
//! is answered without touching the object database. Two stores exist:
//!
//! - **memory**: in-process, bounded, using [moka](https://crates.io/crates/moka)
//! - **disk**: one data file and one metadata file per fingerprint
//!
//! The store is selected at runtime based on configuration.

pub mod artifact;
#[cfg(feature = "disk")]
pub mod disk;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod store;

pub use artifact::DownloadArtifact;
pub use provider::DownloadCacheManager;
pub use store::{ArtifactStore, DownloadCache};
