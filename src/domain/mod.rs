//! Domain layer types and invariants.

pub mod controls;
pub mod error;
pub mod events;
pub mod job;
pub mod presets;
pub mod request;
