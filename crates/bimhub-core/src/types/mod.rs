//! Core type definitions used across the BimHub workspace.

pub mod id;

pub use id::*;
