use crate::core::models::ids::{RestraintId, ScoreStateId};
use crate::core::models::model::Model;
use crate::engine::config::EvaluationConfig;
use crate::engine::error::EvalError;
use crate::engine::graph::order::ModelDependencies;
use crate::engine::scheduler::Scheduler;
use crate::engine::session::Evaluation;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
enum Selection {
    /// The model's root restraint set, with inherited weights.
    Model,
    /// A fixed list of restraints, each with its own model weight.
    Restraints(Vec<RestraintId>),
}

#[derive(Debug, Clone)]
struct Prepared {
    dependencies: ModelDependencies,
    restraints: Vec<RestraintId>,
    score_states: Vec<ScoreStateId>,
}

/// A reusable scoring entry point for optimizers and samplers.
///
/// Resolves the restraints to score and the score states they need, caches
/// that resolution for the current model generation, and re-resolves it
/// lazily after the model's dependency structure changes.
#[derive(Debug, Clone)]
pub struct ScoringFunction {
    name: String,
    selection: Selection,
    scheduler: Scheduler,
    prepared: Option<Prepared>,
    last: Option<Evaluation>,
}

impl ScoringFunction {
    /// Scores the model's whole restraint-set tree.
    pub fn for_model(name: &str, config: EvaluationConfig) -> Self {
        Self::with_selection(name, Selection::Model, config)
    }

    /// Scores a fixed list of restraints.
    pub fn for_restraints(name: &str, restraints: Vec<RestraintId>, config: EvaluationConfig) -> Self {
        Self::with_selection(name, Selection::Restraints(restraints), config)
    }

    fn with_selection(name: &str, selection: Selection, config: EvaluationConfig) -> Self {
        Self {
            name: name.to_string(),
            selection,
            scheduler: Scheduler::new(config),
            prepared: None,
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Result of the most recent successful evaluation.
    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last.as_ref()
    }

    /// Score states this function runs, in dependency order.
    pub fn score_states(&mut self, model: &Model) -> Result<&[ScoreStateId], EvalError> {
        let (restraints, _) = self.restraints_and_weights(model)?;
        self.prepare(model, restraints)?;
        Ok(self
            .prepared
            .as_ref()
            .map(|p| p.score_states.as_slice())
            .unwrap_or_default())
    }

    /// Total weighted score of the model.
    pub fn evaluate(&mut self, model: &mut Model, compute_derivatives: bool) -> Result<f64, EvalError> {
        self.run(model, compute_derivatives, false).map(|e| e.total())
    }

    /// Evaluates with early exit against each restraint's maximum score and
    /// the configured global budget. Check `good_score` on the result before
    /// trusting the total.
    pub fn evaluate_if_good(
        &mut self,
        model: &mut Model,
        compute_derivatives: bool,
    ) -> Result<Evaluation, EvalError> {
        self.run(model, compute_derivatives, true)
    }

    #[instrument(skip_all, name = "scoring_function", fields(name = %self.name))]
    fn run(
        &mut self,
        model: &mut Model,
        compute_derivatives: bool,
        early_exit: bool,
    ) -> Result<Evaluation, EvalError> {
        let (restraints, weights) = self.restraints_and_weights(model)?;
        self.prepare(model, restraints.clone())?;
        let score_states = self
            .prepared
            .as_ref()
            .map(|p| p.score_states.clone())
            .unwrap_or_default();

        let evaluation = self.scheduler.evaluate(
            model,
            &restraints,
            &weights,
            &score_states,
            compute_derivatives,
            early_exit,
        )?;
        self.last = Some(evaluation.clone());
        Ok(evaluation)
    }

    fn restraints_and_weights(&self, model: &Model) -> Result<(Vec<RestraintId>, Vec<f64>), EvalError> {
        match &self.selection {
            Selection::Model => Ok(model.restraints_and_weights()?.into_iter().unzip()),
            Selection::Restraints(list) => {
                let weights = list
                    .iter()
                    .map(|&r| model.weight(r))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((list.clone(), weights))
            }
        }
    }

    /// Zero-weight sets drop out of the flattened tree without a generation
    /// change, so the restraint list is part of the cache key.
    fn prepare(&mut self, model: &Model, restraints: Vec<RestraintId>) -> Result<(), EvalError> {
        if let Some(prepared) = &self.prepared {
            if prepared.dependencies.is_current(model) && prepared.restraints == restraints {
                return Ok(());
            }
        }
        let dependencies = ModelDependencies::for_restraints(model, &restraints)?;
        let score_states = dependencies.score_states_for(&restraints)?;
        info!(
            name = %self.name,
            restraints = restraints.len(),
            score_states = score_states.len(),
            generation = model.generation(),
            "Resolved scoring function dependencies."
        );
        self.prepared = Some(Prepared {
            dependencies,
            restraints,
            score_states,
        });
        Ok(())
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

    const X: FloatKey = FloatKey::new("x");

    /// Writes twice its input onto its output.
    struct Doubler {
        input: ParticleId,
        output: ParticleId,
    }

    impl ScoreState for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }
        fn input_particles(&self) -> Vec<ParticleId> {
            vec![self.input]
        }
        fn output_particles(&self) -> Vec<ParticleId> {
            vec![self.output]
        }
        fn before_evaluate(&mut self, particles: &mut ParticleStore) -> Result<(), ScoringError> {
            let x = particles.get(self.input, X)?;
            particles.set(self.output, X, 2.0 * x)?;
            Ok(())
        }
        fn after_evaluate(
            &mut self,
            _particles: &ParticleStore,
            derivatives: Option<&mut DerivativeAccumulator<'_>>,
        ) -> Result<(), ScoringError> {
            if let Some(acc) = derivatives {
                let d = acc.derivative(self.output, X)?;
                acc.add_to_derivative(self.input, X, 2.0 * d)?;
            }
            Ok(())
        }
    }

    struct Square(ParticleId);

    impl Restraint for Square {
        fn name(&self) -> &str {
            "square"
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

    fn model() -> (Model, ParticleId, ParticleId, RestraintId) {
        let mut model = Model::new();
        let a = model.add_particle("a");
        let b = model.add_particle("b");
        model.particles_mut().set(a, X, 1.5).unwrap();
        model.particles_mut().set(b, X, 0.0).unwrap();
        model.add_score_state(Doubler { input: a, output: b });
        let r = model.add_restraint(Square(b));
        (model, a, b, r)
    }

    #[test]
    fn evaluate_runs_required_score_states_and_sums() {
        let (mut model, a, b, _) = model();
        let mut sf = ScoringFunction::for_model("all", EvaluationConfig::default());
        let total = sf.evaluate(&mut model, true).unwrap();
        assert_eq!(total, 9.0);
        assert_eq!(model.derivative(b, X), 6.0);
        assert_eq!(model.derivative(a, X), 12.0);
        assert_eq!(sf.last_evaluation().map(|e| e.good_score), Some(true));
        assert_eq!(sf.scheduler().evaluation_count(), 1);
    }

    #[test]
    fn dependencies_are_reresolved_after_structural_changes() {
        let (mut model, a, _, r) = model();
        let mut sf = ScoringFunction::for_restraints("one", vec![r], EvaluationConfig::default());
        assert_eq!(sf.score_states(&model).unwrap().len(), 1);

        let c = model.add_particle("c");
        model.particles_mut().set(c, X, 0.0).unwrap();
        model.add_score_state(Doubler { input: c, output: a });
        assert_eq!(sf.score_states(&model).unwrap().len(), 2);
        assert_eq!(sf.evaluate(&mut model, false).unwrap(), 0.0);
    }

    #[test]
    fn zero_weight_sets_drop_out_of_the_model_function() {
        let (mut model, _, b, _) = model();
        let root = model.root_restraint_set();
        let side = model.add_restraint_set(root, "side").unwrap();
        model.add_restraint_to_set(side, Square(b)).unwrap();
        let mut sf = ScoringFunction::for_model("all", EvaluationConfig::default());
        assert_eq!(sf.evaluate(&mut model, false).unwrap(), 18.0);

        model.set_restraint_set_weight(side, 0.0).unwrap();
        assert_eq!(sf.evaluate(&mut model, false).unwrap(), 9.0);
    }

    #[test]
    fn evaluate_if_good_flags_restraints_over_their_maximum() {
        let (mut model, _, _, r) = model();
        model.set_maximum_score(r, 4.0).unwrap();
        let mut sf = ScoringFunction::for_model("all", EvaluationConfig::default());
        let evaluation = sf.evaluate_if_good(&mut model, false).unwrap();
        assert!(!evaluation.good_score);
        assert!(evaluation.total() >= 4.0);
    }
}
