use super::config::{EvaluationConfig, VerificationLevel};
use super::error::EvalError;
use super::session::{Evaluation, EvaluationSession};
use super::statistics::Statistics;
use crate::core::models::ids::{RestraintId, ScoreStateId};
use crate::core::models::model::Model;
use tracing::{debug, instrument};

/// Drives evaluations of a model through the staged pipeline.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: EvaluationConfig,
    statistics: Statistics,
    evaluation_count: u64,
}

impl Scheduler {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            statistics: Statistics::new(),
            evaluation_count: 0,
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics.clear();
    }

    /// Number of evaluations completed through this scheduler.
    pub fn evaluation_count(&self) -> u64 {
        self.evaluation_count
    }

    /// Opens a session for driving the evaluation phases by hand.
    ///
    /// # Errors
    ///
    /// [`EvalError::Usage`] if the model is already mid-evaluation.
    pub fn begin<'a>(&'a mut self, model: &'a mut Model) -> Result<EvaluationSession<'a>, EvalError> {
        EvaluationSession::open(
            model,
            &self.config,
            &mut self.statistics,
            &mut self.evaluation_count,
        )
    }

    /// Runs one full evaluation.
    ///
    /// Score states run forward in the given order, then the restraints are
    /// scored, then score states run backward in reverse order. `score_states`
    /// must be ordered consistently with the dependency graph (see
    /// [`crate::engine::graph::order`]). Returns the weighted score of each
    /// restraint.
    ///
    /// On any error the model is returned to
    /// [`super::session::Stage::NotEvaluating`] and can be evaluated again.
    #[instrument(skip_all, name = "evaluate", fields(restraints = restraints.len(), score_states = score_states.len(), compute_derivatives, early_exit))]
    pub fn evaluate(
        &mut self,
        model: &mut Model,
        restraints: &[RestraintId],
        weights: &[f64],
        score_states: &[ScoreStateId],
        compute_derivatives: bool,
        early_exit: bool,
    ) -> Result<Evaluation, EvalError> {
        let check_derivatives =
            compute_derivatives && self.config.verification == VerificationLevel::Internal;
        let mut session = self.begin(model)?;

        session.before_evaluate(score_states)?;
        if compute_derivatives {
            session.zero_derivatives();
        }
        let evaluation =
            session.evaluate_restraints(restraints, weights, compute_derivatives, early_exit)?;
        session.after_evaluate(score_states, compute_derivatives)?;
        if check_derivatives {
            session.check_derivatives()?;
        }
        session.finish();

        debug!(
            total = evaluation.total(),
            good_score = evaluation.good_score,
            "Evaluation complete."
        );
        Ok(evaluation)
    }

    /// Evaluates the model's root restraint set with every score state it
    /// needs, in dependency order.
    pub fn evaluate_model(
        &mut self,
        model: &mut Model,
        compute_derivatives: bool,
    ) -> Result<Evaluation, EvalError> {
        let (restraints, weights): (Vec<_>, Vec<_>) =
            model.restraints_and_weights()?.into_iter().unzip();
        let score_states = super::graph::order::required_score_states(model, &restraints)?;
        self.evaluate(
            model,
            &restraints,
            &weights,
            &score_states,
            compute_derivatives,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ParticleId;
    use crate::core::models::keys::FloatKey;
    use crate::core::models::store::ParticleStore;
    use crate::core::scoring::accumulator::DerivativeAccumulator;
    use crate::core::scoring::error::ScoringError;
    use crate::core::scoring::traits::{Restraint, ScoreState};
    use crate::engine::error::Access;
    use crate::engine::session::Stage;

    const X: FloatKey = FloatKey::new("x");

    struct Harmonic(ParticleId);

    impl Restraint for Harmonic {
        fn name(&self) -> &str {
            "harmonic"
        }
        fn input_particles(&self) -> Vec<ParticleId> {
            vec![self.0]
        }
        fn evaluate(
            &self,
            particles: &ParticleStore,
            derivatives: Option<&mut DerivativeAccumulator<'_>>,
        ) -> Result<f64, ScoringError> {
            let x = particles.get(self.0, X)?;
            if let Some(acc) = derivatives {
                acc.add_to_derivative(self.0, X, 2.0 * x)?;
            }
            Ok(x * x)
        }
    }

    fn model_with_restraint(x: f64) -> (Model, ParticleId, RestraintId) {
        let mut model = Model::new();
        let p = model.add_particle("p");
        model.particles_mut().set(p, X, x).unwrap();
        let r = model.add_restraint(Harmonic(p));
        (model, p, r)
    }

    #[test]
    fn evaluate_returns_weighted_scores_and_derivatives() {
        let (mut model, p, r) = model_with_restraint(3.0);
        let mut scheduler = Scheduler::default();
        let evaluation = scheduler
            .evaluate(&mut model, &[r], &[2.0], &[], true, false)
            .unwrap();
        assert_eq!(evaluation.scores, vec![18.0]);
        assert!(evaluation.good_score);
        assert_eq!(model.derivative(p, X), 12.0);
        assert_eq!(model.last_score(r).unwrap(), Some(9.0));
        assert_eq!(scheduler.evaluation_count(), 1);
        assert_eq!(model.stage(), Stage::NotEvaluating);
    }

    #[test]
    fn mismatched_weights_are_a_usage_error() {
        let (mut model, _, r) = model_with_restraint(1.0);
        let mut scheduler = Scheduler::default();
        let result = scheduler.evaluate(&mut model, &[r], &[], &[], false, false);
        assert!(matches!(result, Err(EvalError::Usage(_))));
        assert_eq!(model.stage(), Stage::NotEvaluating);
        assert_eq!(scheduler.evaluation_count(), 0);
    }

    #[test]
    fn leaked_session_blocks_further_evaluation() {
        let (mut model, _, r) = model_with_restraint(1.0);
        let mut scheduler = Scheduler::default();
        {
            let mut session = scheduler.begin(&mut model).unwrap();
            session.before_evaluate(&[]).unwrap();
            std::mem::forget(session);
        }
        assert_eq!(model.stage(), Stage::BeforeEvaluate);
        let result = scheduler.evaluate(&mut model, &[r], &[1.0], &[], false, false);
        assert!(matches!(result, Err(EvalError::Usage(_))));
    }

    #[test]
    fn statistics_are_gathered_only_when_enabled() {
        let (mut model, _, r) = model_with_restraint(1.0);
        let mut quiet = Scheduler::default();
        quiet.evaluate(&mut model, &[r], &[1.0], &[], false, false).unwrap();
        assert!(quiet.statistics().is_empty());

        let config = EvaluationConfig::builder()
            .gather_statistics(true)
            .build()
            .unwrap();
        let mut profiling = Scheduler::new(config);
        profiling.evaluate(&mut model, &[r], &[1.0], &[], false, false).unwrap();
        profiling.evaluate(&mut model, &[r], &[1.0], &[], false, false).unwrap();
        assert_eq!(profiling.statistics().restraint(r).map(|s| s.calls), Some(2));
    }

    #[test]
    fn evaluate_model_uses_the_restraint_set_tree() {
        let (mut model, _, r) = model_with_restraint(2.0);
        let root = model.root_restraint_set();
        model.set_restraint_set_weight(root, 0.5).unwrap();
        let mut scheduler = Scheduler::default();
        let evaluation = scheduler.evaluate_model(&mut model, false).unwrap();
        assert_eq!(evaluation.scores, vec![2.0]);
        assert_eq!(model.last_score(r).unwrap(), Some(4.0));
    }

    /// Declares `keep` as its only input, then deletes `target`.
    struct Remover {
        keep: ParticleId,
        target: ParticleId,
    }

    impl ScoreState for Remover {
        fn name(&self) -> &str {
            "remover"
        }
        fn input_particles(&self) -> Vec<ParticleId> {
            vec![self.keep]
        }
        fn output_particles(&self) -> Vec<ParticleId> {
            Vec::new()
        }
        fn before_evaluate(&mut self, particles: &mut ParticleStore) -> Result<(), ScoringError> {
            particles.remove_particle(self.target)?;
            Ok(())
        }
        fn after_evaluate(
            &mut self,
            _particles: &ParticleStore,
            _derivatives: Option<&mut DerivativeAccumulator<'_>>,
        ) -> Result<(), ScoringError> {
            Ok(())
        }
    }

    fn removal_model(target_declared: bool) -> (Model, ScoreStateId, ParticleId) {
        let mut model = Model::new();
        let a = model.add_particle("A");
        let z = model.add_particle("Z");
        let target = if target_declared { a } else { z };
        let s = model.add_score_state(Remover { keep: a, target });
        (model, s, target)
    }

    #[test]
    fn removing_an_undeclared_particle_is_an_access_violation() {
        let (mut model, s, z) = removal_model(false);
        let generation = model.generation();
        let config = EvaluationConfig::builder()
            .verification(VerificationLevel::Internal)
            .build()
            .unwrap();
        let mut scheduler = Scheduler::new(config);
        let err = scheduler
            .evaluate(&mut model, &[], &[], &[s], false, false)
            .unwrap_err();
        match err {
            EvalError::AccessViolation {
                particle, access, ..
            } => {
                assert_eq!(particle, z);
                assert_eq!(access, Access::Write);
            }
            e => panic!("unexpected {e:?}"),
        }
        assert!(model.particles().contains_particle(z));
        assert!(!model.is_verified());
        assert_eq!(model.generation(), generation);
    }

    #[test]
    fn removing_a_declared_particle_mid_evaluation_is_a_usage_error() {
        let (mut model, s, a) = removal_model(true);
        let config = EvaluationConfig::builder()
            .verification(VerificationLevel::Internal)
            .build()
            .unwrap();
        let mut scheduler = Scheduler::new(config);
        let result = scheduler.evaluate(&mut model, &[], &[], &[s], false, false);
        assert!(matches!(result, Err(EvalError::Usage(_))));
        assert!(model.particles().contains_particle(a));
        assert_eq!(model.stage(), Stage::NotEvaluating);
    }

    #[test]
    fn unverified_evaluations_cannot_remove_particles_either() {
        let (mut model, s, z) = removal_model(false);
        let config = EvaluationConfig::builder()
            .verification(VerificationLevel::None)
            .build()
            .unwrap();
        let mut scheduler = Scheduler::new(config);
        let result = scheduler.evaluate(&mut model, &[], &[], &[s], false, false);
        assert!(matches!(result, Err(EvalError::Usage(_))));
        assert!(model.particles().contains_particle(z));
        assert!(!model.particles().is_frozen());
    }

    struct Huge;

    impl Restraint for Huge {
        fn name(&self) -> &str {
            "huge"
        }
        fn input_particles(&self) -> Vec<ParticleId> {
            Vec::new()
        }
        fn evaluate(
            &self,
            _particles: &ParticleStore,
            _derivatives: Option<&mut DerivativeAccumulator<'_>>,
        ) -> Result<f64, ScoringError> {
            Ok(1e308)
        }
    }

    #[test]
    fn overflowing_weighted_scores_are_numeric_errors() {
        let mut model = Model::new();
        let r = model.add_restraint(Huge);
        let mut scheduler = Scheduler::default();
        let result = scheduler.evaluate(&mut model, &[r], &[10.0], &[], false, false);
        assert!(matches!(result, Err(EvalError::Numeric { value, .. }) if value.is_infinite()));

        let result = scheduler.evaluate(&mut model, &[r], &[f64::NAN], &[], false, false);
        assert!(matches!(result, Err(EvalError::Numeric { .. })));
        assert_eq!(model.stage(), Stage::NotEvaluating);
        assert_eq!(scheduler.evaluation_count(), 0);
    }
}
