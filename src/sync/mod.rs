//! Shared clip state
//!
//! - `state`: what observers see, with selector accessors
//! - `reducer`: pure command planning and event folding
//! - `container`: the owner that runs effects and publishes state

pub mod container;
pub mod reducer;
pub mod state;

pub use container::ClipStateContainer;
pub use reducer::{plan, reduce, Command, Effect, Event};
pub use state::ClipState;
