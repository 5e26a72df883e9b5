//! Built-in simulation engines.
//!
//! Used by the `hil_bridge` binary and tests when no external physics
//! engine drives the bridge.

mod lightweight;

pub use lightweight::{LightweightConfig, LightweightEngine};
