//! AT protocol layer: command/response engine and URC fan-out.

pub mod engine;
pub mod urc;

pub use engine::{AtCommandEngine, EngineState};
pub use urc::{AtEvent, ListenerRegistry, UrcListener, UrcPrefix, classify};
