//! Reading and writing structures and trajectories.
//!
//! Trajectories are append-only sequences of frames: writers never rewind,
//! deduplicate or reorder what is already on disk.

pub mod traits;
pub mod xyz;
