use super::error::ScoringError;
use crate::core::models::ids::ParticleId;
use crate::core::models::keys::FloatKey;
use crate::core::models::store::ParticleStore;
use std::collections::HashMap;

/// Per-model storage of partial derivatives, one value per particle and
/// float attribute. Missing entries read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivativeTable {
    values: HashMap<(ParticleId, FloatKey), f64>,
}

impl DerivativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, particle: ParticleId, key: FloatKey) -> f64 {
        self.values.get(&(particle, key)).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, particle: ParticleId, key: FloatKey, value: f64) {
        *self.values.entry((particle, key)).or_insert(0.0) += value;
    }

    pub fn zero(&mut self) {
        self.values.clear();
    }

    pub fn remove_particle(&mut self, particle: ParticleId) {
        self.values.retain(|(p, _), _| *p != particle);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, FloatKey, f64)> + '_ {
        self.values.iter().map(|(&(p, k), &v)| (p, k, v))
    }

    /// Returns the first non-finite entry, if any.
    pub fn find_non_finite(&self) -> Option<(ParticleId, FloatKey, f64)> {
        self.iter().find(|(_, _, v)| !v.is_finite())
    }
}

/// Write handle for derivative contributions during one restraint or
/// score-state call.
///
/// Every contribution is multiplied by the accumulator's weight before it is
/// stored. Writes and reads honour the access scope of the running call, so an
/// undeclared particle is rejected exactly like an undeclared attribute write.
pub struct DerivativeAccumulator<'a> {
    particles: &'a ParticleStore,
    table: &'a mut DerivativeTable,
    weight: f64,
}

impl<'a> DerivativeAccumulator<'a> {
    pub fn new(particles: &'a ParticleStore, table: &'a mut DerivativeTable, weight: f64) -> Self {
        Self {
            particles,
            table,
            weight,
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Reborrows the accumulator with its weight multiplied by `factor`.
    /// Composite restraints use this to forward a scaled accumulator to their
    /// members.
    pub fn scaled(&mut self, factor: f64) -> DerivativeAccumulator<'_> {
        DerivativeAccumulator {
            particles: self.particles,
            table: &mut *self.table,
            weight: self.weight * factor,
        }
    }

    /// Adds `value * weight` to the derivative of `key` on `particle`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::NonFinite`] for NaN or infinite contributions
    /// and [`ScoringError::Model`] if the particle is unknown or outside the
    /// declared write set of the running call.
    pub fn add_to_derivative(
        &mut self,
        particle: ParticleId,
        key: FloatKey,
        value: f64,
    ) -> Result<(), ScoringError> {
        if !value.is_finite() {
            let name = self.particles.particle_name(particle).unwrap_or("?");
            return Err(ScoringError::NonFinite {
                value,
                context: format!("derivative of '{}' on particle '{}'", key, name),
            });
        }
        self.particles.check_writable(particle)?;
        self.table.add(particle, key, value * self.weight);
        Ok(())
    }

    /// Current accumulated derivative, used by backward score-state passes.
    pub fn derivative(&self, particle: ParticleId, key: FloatKey) -> Result<f64, ScoringError> {
        self.particles.check_readable(particle)?;
        Ok(self.table.get(particle, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::error::ModelError;
    use std::collections::HashSet;

    const X: FloatKey = FloatKey::new("x");

    #[test]
    fn contributions_are_weighted_and_summed() {
        let mut store = ParticleStore::new();
        let p = store.add_particle("p");
        let mut table = DerivativeTable::new();
        {
            let mut acc = DerivativeAccumulator::new(&store, &mut table, 2.0);
            acc.add_to_derivative(p, X, 1.5).unwrap();
            acc.add_to_derivative(p, X, 0.5).unwrap();
            assert_eq!(acc.derivative(p, X).unwrap(), 4.0);
        }
        assert_eq!(table.get(p, X), 4.0);
    }

    #[test]
    fn scaled_accumulator_multiplies_weights() {
        let mut store = ParticleStore::new();
        let p = store.add_particle("p");
        let mut table = DerivativeTable::new();
        let mut acc = DerivativeAccumulator::new(&store, &mut table, 2.0);
        acc.scaled(0.25).add_to_derivative(p, X, 4.0).unwrap();
        assert_eq!(table.get(p, X), 2.0);
    }

    #[test]
    fn non_finite_contribution_is_rejected() {
        let mut store = ParticleStore::new();
        let p = store.add_particle("p");
        let mut table = DerivativeTable::new();
        let mut acc = DerivativeAccumulator::new(&store, &mut table, 1.0);
        let err = acc.add_to_derivative(p, X, f64::NAN).unwrap_err();
        assert!(matches!(err, ScoringError::NonFinite { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn write_locked_particle_rejects_contributions() {
        let mut store = ParticleStore::new();
        let p = store.add_particle("p");
        store.lock_all_except(&[p].into_iter().collect(), &HashSet::new());
        let mut table = DerivativeTable::new();
        let mut acc = DerivativeAccumulator::new(&store, &mut table, 1.0);
        let err = acc.add_to_derivative(p, X, 1.0).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::Model {
                source: ModelError::WriteLocked { .. }
            }
        ));
    }

    #[test]
    fn zero_clears_every_entry_and_reports_non_finite() {
        let mut table = DerivativeTable::new();
        let mut store = ParticleStore::new();
        let p = store.add_particle("p");
        table.add(p, X, f64::INFINITY);
        assert!(table.find_non_finite().is_some());
        table.zero();
        assert_eq!(table.get(p, X), 0.0);
        assert!(table.find_non_finite().is_none());
    }
}
