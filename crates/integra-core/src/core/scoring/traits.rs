use super::accumulator::DerivativeAccumulator;
use super::error::ScoringError;
use crate::core::models::ids::{ContainerId, ParticleId};
use crate::core::models::store::ParticleStore;

/// A component that keeps derived attributes consistent around scoring.
///
/// The forward pass writes derived attributes of the outputs from the inputs.
/// The backward pass propagates derivatives accumulated on the outputs back
/// onto the inputs. Declared inputs and outputs drive both dependency ordering
/// and access verification, so an implementation must declare every particle
/// it touches.
pub trait ScoreState {
    fn name(&self) -> &str;

    fn input_particles(&self) -> Vec<ParticleId>;

    fn input_containers(&self) -> Vec<ContainerId> {
        Vec::new()
    }

    fn output_particles(&self) -> Vec<ParticleId>;

    fn output_containers(&self) -> Vec<ContainerId> {
        Vec::new()
    }

    fn before_evaluate(&mut self, particles: &mut ParticleStore) -> Result<(), ScoringError>;

    /// Backward pass. `derivatives` is `None` when the evaluation does not
    /// compute derivatives.
    fn after_evaluate(
        &mut self,
        particles: &ParticleStore,
        derivatives: Option<&mut DerivativeAccumulator<'_>>,
    ) -> Result<(), ScoringError>;
}

/// A scoring term over particle state.
///
/// Restraints receive a shared borrow of the store and therefore cannot mutate
/// attributes. Derivative contributions go through the accumulator, which
/// applies the restraint's effective weight.
pub trait Restraint {
    fn name(&self) -> &str;

    fn input_particles(&self) -> Vec<ParticleId>;

    fn input_containers(&self) -> Vec<ContainerId> {
        Vec::new()
    }

    fn evaluate(
        &self,
        particles: &ParticleStore,
        derivatives: Option<&mut DerivativeAccumulator<'_>>,
    ) -> Result<f64, ScoringError>;

    /// Evaluates with a score budget. Implementations may stop early and
    /// return any value greater than `max_score` once the budget is known to
    /// be exceeded; the default evaluates fully.
    fn evaluate_if_good(
        &self,
        particles: &ParticleStore,
        derivatives: Option<&mut DerivativeAccumulator<'_>>,
        max_score: f64,
    ) -> Result<f64, ScoringError> {
        let _ = max_score;
        self.evaluate(particles, derivatives)
    }
}
