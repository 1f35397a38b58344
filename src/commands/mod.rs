//! Engine operations.
//!
//! Transport-agnostic entry points. Each takes a connection and an
//! `EngineContext` (owner scope, clock, config) and returns typed results
//! for any caller: the CLI, tests, or an embedding application.

pub mod doses;
pub mod medications;
pub mod patterns;
pub mod schedule;
pub mod state;

pub use doses::*;
pub use medications::*;
pub use patterns::*;
pub use schedule::*;
pub use state::EngineContext;
