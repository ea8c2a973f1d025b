//! Business logic services.
//!
//! Services contain the key lifecycle separated from the command surface.
//! They own persistence, time and the publish side effect.

pub mod clock;
pub mod key_store;
pub mod publish;
