//! # Workflows Module
//!
//! High-level entry points that drive complete simulations.
//!
//! ## Overview
//!
//! A [`pipeline::Pipeline`] owns the simulation state, an ordered list of Monte
//! Carlo protocols and the run's random source. It validates the logging setup
//! eagerly, calls each protocol on its own cadence, and writes log records
//! (to `tracing`, an optional tab-separated file and the progress callback)
//! together with an append-only extended-XYZ trajectory.
//!
//! - **Pipeline** ([`pipeline`]) - Outer time loop, scheduling and logging
//! - **Records** ([`records`]) - Tab-separated log-record file

pub mod pipeline;
pub mod records;
