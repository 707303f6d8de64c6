use super::error::EngineError;
use super::state::{PropertiesUpdate, State};
use rand::RngCore;
use std::fmt;

/// Prefix shared by every protocol metric exposed as a log field.
pub const METRIC_NAMESPACE: &str = "module";

/// Invocation cadence of a protocol within the outer pipeline loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Fire on every outer step divisible by this value.
    pub invoke_every: usize,
    /// Inner move attempts per firing.
    pub steps_per_invoke: usize,
    /// Inner move attempts completed so far.
    pub num_invokes: u64,
}

impl Schedule {
    pub fn new(invoke_every: usize, steps_per_invoke: usize) -> Self {
        Self {
            invoke_every,
            steps_per_invoke,
            num_invokes: 0,
        }
    }

    #[inline]
    pub fn fires_at(&self, outer_step: u64) -> bool {
        outer_step % self.invoke_every as u64 == 0
    }
}

/// Full log-field name of a protocol counter, e.g. `module.asmc.accepted_swaps`.
pub fn metric_field(protocol: &str, counter: &str) -> String {
    format!("{}.{}.{}", METRIC_NAMESPACE, protocol, counter)
}

/// A pluggable Monte Carlo move generator.
///
/// Protocols never own the [`State`]; every operation receives it explicitly,
/// together with the run's random source. Implementors supply `initialize` and
/// `step`; the scheduling wrapper [`Protocol::evolve`] is shared.
pub trait Protocol: fmt::Debug {
    /// Unique name used to namespace the protocol's log fields.
    fn name(&self) -> &str;

    fn schedule(&self) -> &Schedule;

    fn schedule_mut(&mut self) -> &mut Schedule;

    /// Checks the protocol against the state's species inventory. Called once
    /// before the first `evolve`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] if the declared species are not
    /// present in the state.
    fn initialize(&mut self, state: &State) -> Result<(), EngineError>;

    /// Performs exactly one move attempt and updates the acceptance counters.
    ///
    /// The state satisfies all of its invariants afterwards, whether the move
    /// was accepted, rejected, or aborted by an evaluator failure.
    fn step(&mut self, state: &mut State, rng: &mut dyn RngCore) -> Result<(), EngineError>;

    /// Current values of the protocol's counters, by short name.
    fn metrics(&self) -> Vec<(&'static str, u64)>;

    /// Log fields this protocol exposes.
    fn log_fields(&self) -> Vec<String> {
        self.metrics()
            .into_iter()
            .map(|(counter, _)| metric_field(self.name(), counter))
            .collect()
    }

    /// Resolves one of the fields returned by [`Protocol::log_fields`].
    fn metric(&self, field: &str) -> Option<u64> {
        let prefix = metric_field(self.name(), "");
        let counter = field.strip_prefix(prefix.as_str())?;
        self.metrics()
            .into_iter()
            .find_map(|(name, value)| (name == counter).then_some(value))
    }

    /// Runs `steps_per_invoke` move attempts if the current outer step is a
    /// multiple of `invoke_every`, then advances `properties.step` by one
    /// whether or not the protocol fired.
    ///
    /// A failed attempt still counts as an invocation before the error is
    /// returned, matching the rejection it was booked as.
    fn evolve(&mut self, state: &mut State, rng: &mut dyn RngCore) -> Result<(), EngineError> {
        let schedule = *self.schedule();
        if schedule.fires_at(state.global_step()) {
            for _ in 0..schedule.steps_per_invoke {
                let attempt = self.step(state, rng);
                self.schedule_mut().num_invokes += 1;
                attempt?;
            }
        }
        let next = state.step() + 1;
        state.update(None, Some(PropertiesUpdate::new().step(next)))
    }
}
