//! Long-running action lifecycle entities.

pub mod state;

pub use state::{ActionState, LongActionState};
