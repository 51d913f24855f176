//! Segment rotation: the persisted state and the engine that advances it.

mod engine;
mod state;

pub use engine::{Decision, RotationEngine};
pub use state::{RotationState, SegmentRef};
