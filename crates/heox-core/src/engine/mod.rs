//! # Engine Module
//!
//! The stateful simulation core: a single mutable [`state::State`] shared by a
//! list of Monte Carlo move generators implementing [`protocol::Protocol`].
//!
//! ## Architecture
//!
//! - **State** ([`state`]) - Lattice description and scalar simulation properties
//! - **Protocols** ([`protocol`], [`mc`]) - Scheduling contract plus the atom-swap and
//!   grand-canonical move generators
//! - **Trial moves** (`transaction`) - Tentative relabelling that is committed on
//!   acceptance and reverted exactly on rejection or evaluator failure
//! - **Energy** ([`energy`]) - Vacancy-stripping adapter around the external evaluator
//! - **Configuration** ([`config`]) - Validated builders for protocols and logging
//! - **Progress Monitoring** ([`progress`]) - Callback-based run progress events
//! - **Error Handling** ([`error`]) - The engine error taxonomy
//!
//! ## Invariants
//!
//! - `types` and `positions` always have the same length.
//! - A cached energy always belongs to the configuration currently stored.
//! - Every rejected move leaves labels, positions and cached energy bit-identical
//!   to their values before the attempt.

pub mod config;
pub mod energy;
pub mod error;
pub mod mc;
pub mod progress;
pub mod protocol;
pub mod state;
pub(crate) mod transaction;
