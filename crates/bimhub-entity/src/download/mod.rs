//! Download request value objects.

pub mod compare;
pub mod parameters;

pub use compare::{CompareIdentifier, CompareType};
pub use parameters::{DownloadParameters, DownloadType};
