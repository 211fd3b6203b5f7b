use super::config::{EvaluationConfig, VerificationLevel};
use super::error::EvalError;
use super::graph::builder;
use super::statistics::Statistics;
use super::verify::{self, AccessScope, DeclaredAccess};
use crate::core::models::error::ModelError;
use crate::core::models::ids::{RestraintId, ScoreStateId};
use crate::core::models::model::Model;
use crate::core::scoring::accumulator::DerivativeAccumulator;
use std::time::Instant;
use tracing::{debug, instrument, trace, warn};

pub use crate::core::models::model::Stage;

/// Result of scoring a list of restraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Weighted score of each restraint, in request order.
    pub scores: Vec<f64>,
    /// `false` if any restraint exceeded its maximum score or the running
    /// total exceeded the global budget.
    pub good_score: bool,
}

impl Evaluation {
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }
}

/// One evaluation of a model, phase by phase.
///
/// The session owns the model's stage for its whole lifetime: each phase sets
/// the stage on entry and dropping the session puts the model back into
/// [`Stage::NotEvaluating`], whether the phases succeeded or not. Samplers that
/// hold derived state across several restraint evaluations drive the phases
/// directly; everything else goes through [`super::scheduler::Scheduler::evaluate`].
pub struct EvaluationSession<'a> {
    model: &'a mut Model,
    config: &'a EvaluationConfig,
    statistics: &'a mut Statistics,
    evaluation_count: &'a mut u64,
    verify: bool,
    validate: bool,
}

impl<'a> EvaluationSession<'a> {
    pub(crate) fn open(
        model: &'a mut Model,
        config: &'a EvaluationConfig,
        statistics: &'a mut Statistics,
        evaluation_count: &'a mut u64,
    ) -> Result<Self, EvalError> {
        if model.stage != Stage::NotEvaluating {
            return Err(EvalError::Usage(format!(
                "cannot start an evaluation while the model is in stage '{}'",
                model.stage
            )));
        }
        let generation = model.generation();
        let verify = config.verification == VerificationLevel::Internal
            && model.verified_generation != Some(generation);
        let validate = config.verification >= VerificationLevel::Usage
            && model.validated_generation != Some(generation);
        if verify {
            debug!(generation, "Verifying declared dependencies on this evaluation.");
        }
        Ok(Self {
            model,
            config,
            statistics,
            evaluation_count,
            verify,
            validate,
        })
    }

    pub fn stage(&self) -> Stage {
        self.model.stage
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// `true` if calls in this session run under the access verifier.
    pub fn is_verifying(&self) -> bool {
        self.verify
    }

    /// Forward pass: runs each score state's `before_evaluate` in the given
    /// order, which must be consistent with the dependency graph.
    #[instrument(skip_all, name = "before_evaluate", fields(score_states = score_states.len()))]
    pub fn before_evaluate(&mut self, score_states: &[ScoreStateId]) -> Result<(), EvalError> {
        self.model.stage = Stage::BeforeEvaluate;
        if self.validate {
            self.validate_score_states(score_states)?;
        }
        debug!("Starting forward score-state pass.");
        for &id in score_states {
            let Model {
                particles,
                score_states: states,
                ..
            } = &mut *self.model;
            let state = states
                .get_mut(id)
                .ok_or_else(|| EvalError::Usage(format!("score state {id:?} is not registered")))?;
            let caller = format!("score state '{}'", state.name());
            let declared = self
                .verify
                .then(|| DeclaredAccess::forward(&**state, particles));
            trace!(%caller, "before_evaluate");

            let start = self.config.gather_statistics.then(Instant::now);
            let result = {
                let mut scope = AccessScope::enter(particles, declared.as_ref());
                state.before_evaluate(&mut scope)
            };
            if let Some(start) = start {
                self.statistics.record_before(id, state.name(), start.elapsed());
            }
            result.map_err(|e| verify::classify(e, &caller, declared.as_ref(), particles))?;
        }
        Ok(())
    }

    pub fn zero_derivatives(&mut self) {
        self.model.derivatives.zero();
    }

    /// Scores `restraints` with their `weights`.
    ///
    /// With `early_exit`, each restraint is asked to stop once it exceeds
    /// `min(remaining budget / weight, its maximum score)`; non-positive
    /// weights leave the budget term unbounded. Every restraint is evaluated
    /// even once the score is known to be bad, so the score vector is always
    /// complete.
    #[instrument(skip_all, name = "evaluate_restraints", fields(restraints = restraints.len()))]
    pub fn evaluate_restraints(
        &mut self,
        restraints: &[RestraintId],
        weights: &[f64],
        compute_derivatives: bool,
        early_exit: bool,
    ) -> Result<Evaluation, EvalError> {
        if restraints.len() != weights.len() {
            return Err(EvalError::Usage(format!(
                "{} restraints but {} weights",
                restraints.len(),
                weights.len()
            )));
        }
        self.model.stage = Stage::Evaluate;
        if self.validate {
            self.validate_restraints(restraints)?;
        }

        let mut remaining = self.config.maximum_score;
        let mut scores = Vec::with_capacity(restraints.len());
        let mut good_score = true;
        for (&id, &weight) in restraints.iter().zip(weights) {
            let Model {
                particles,
                restraints: entries,
                derivatives,
                ..
            } = &mut *self.model;
            let entry = entries
                .get_mut(id)
                .ok_or_else(|| EvalError::Usage(format!("restraint {id:?} is not registered")))?;
            let caller = format!("restraint '{}'", entry.restraint.name());
            let declared = self
                .verify
                .then(|| DeclaredAccess::restraint(&*entry.restraint, particles));

            let start = self.config.gather_statistics.then(Instant::now);
            let raw = {
                let scope = AccessScope::enter(particles, declared.as_ref());
                let mut accumulator = if compute_derivatives {
                    Some(DerivativeAccumulator::new(&scope, &mut *derivatives, weight))
                } else {
                    None
                };
                let result = if early_exit {
                    let budget = if weight > 0.0 {
                        remaining / weight
                    } else {
                        f64::MAX
                    };
                    entry.restraint.evaluate_if_good(
                        &scope,
                        accumulator.as_mut(),
                        budget.min(entry.maximum_score),
                    )
                } else {
                    entry.restraint.evaluate(&scope, accumulator.as_mut())
                };
                drop(accumulator);
                result.map_err(|e| verify::classify(e, &caller, declared.as_ref(), &scope))?
            };
            if let Some(start) = start {
                self.statistics
                    .record_restraint(id, entry.restraint.name(), start.elapsed(), raw);
            }
            if !raw.is_finite() {
                return Err(EvalError::Numeric {
                    value: raw,
                    context: format!("score of {caller}"),
                });
            }

            let weighted = raw * weight;
            if !weighted.is_finite() {
                return Err(EvalError::Numeric {
                    value: weighted,
                    context: format!("weighted score of {caller} (raw {raw}, weight {weight})"),
                });
            }
            remaining -= weighted;
            entry.last_score = Some(raw);
            if raw > entry.maximum_score || remaining < 0.0 {
                if good_score {
                    trace!(%caller, raw, remaining, "Score is no longer good.");
                }
                good_score = false;
            }
            trace!(%caller, raw, weighted, "Restraint evaluated.");
            scores.push(weighted);
        }
        Ok(Evaluation { scores, good_score })
    }

    /// Backward pass: runs each score state's `after_evaluate` in exactly the
    /// reverse of `score_states`.
    #[instrument(skip_all, name = "after_evaluate", fields(score_states = score_states.len()))]
    pub fn after_evaluate(
        &mut self,
        score_states: &[ScoreStateId],
        compute_derivatives: bool,
    ) -> Result<(), EvalError> {
        self.model.stage = Stage::AfterEvaluate;
        debug!("Starting backward score-state pass.");
        for &id in score_states.iter().rev() {
            let Model {
                particles,
                score_states: states,
                derivatives,
                ..
            } = &mut *self.model;
            let state = states
                .get_mut(id)
                .ok_or_else(|| EvalError::Usage(format!("score state {id:?} is not registered")))?;
            let caller = format!("score state '{}'", state.name());
            let declared = self
                .verify
                .then(|| DeclaredAccess::backward(&**state, particles));
            trace!(%caller, "after_evaluate");

            let start = self.config.gather_statistics.then(Instant::now);
            let result = {
                let scope = AccessScope::enter(particles, declared.as_ref());
                let mut accumulator = if compute_derivatives {
                    Some(DerivativeAccumulator::new(&scope, &mut *derivatives, 1.0))
                } else {
                    None
                };
                state.after_evaluate(&scope, accumulator.as_mut())
            };
            if let Some(start) = start {
                self.statistics.record_after(id, state.name(), start.elapsed());
            }
            result.map_err(|e| verify::classify(e, &caller, declared.as_ref(), particles))?;
        }
        Ok(())
    }

    /// Fails on the first non-finite derivative in the model.
    pub fn check_derivatives(&self) -> Result<(), EvalError> {
        if let Some((particle, key, value)) = self.model.derivatives.find_non_finite() {
            let name = self.model.particles.particle_name(particle).unwrap_or("?");
            warn!(particle = name, key = key.name(), value, "Non-finite derivative.");
            return Err(EvalError::Numeric {
                value,
                context: format!("derivative of '{key}' on particle '{name}'"),
            });
        }
        Ok(())
    }

    /// Completes the evaluation: counts it and records that the current model
    /// generation passed the first-call checks.
    pub fn finish(self) {
        let generation = self.model.generation();
        if self.verify {
            self.model.verified_generation = Some(generation);
        }
        if self.validate {
            self.model.validated_generation = Some(generation);
        }
        *self.evaluation_count += 1;
    }

    fn validate_score_states(&self, score_states: &[ScoreStateId]) -> Result<(), EvalError> {
        for &id in score_states {
            let state = self.model.score_state(id).map_err(usage)?;
            builder::declared(
                self.model,
                id.into(),
                state.input_particles(),
                state.input_containers(),
            )?;
            builder::declared(
                self.model,
                id.into(),
                state.output_particles(),
                state.output_containers(),
            )?;
        }
        Ok(())
    }

    fn validate_restraints(&self, restraints: &[RestraintId]) -> Result<(), EvalError> {
        for &id in restraints {
            let restraint = self.model.restraint(id).map_err(usage)?;
            builder::declared(
                self.model,
                id.into(),
                restraint.input_particles(),
                restraint.input_containers(),
            )?;
        }
        Ok(())
    }
}

fn usage(err: ModelError) -> EvalError {
    EvalError::Usage(err.to_string())
}

impl Drop for EvaluationSession<'_> {
    fn drop(&mut self) {
        self.model.stage = Stage::NotEvaluating;
    }
}
