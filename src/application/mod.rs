//! Application services: the render pipeline and the event subscription.

pub mod backend;
pub mod error;
pub mod render;
pub mod schedule;
pub mod stream;
