use super::container::Container;
use super::error::ModelError;
use super::ids::{ContainerId, ParticleId};
use super::keys::AttributeKey;
use super::particle::{AttributeValue, Particle};
use slotmap::SlotMap;
use std::collections::HashSet;

/// Owns every particle and container of a model.
///
/// All attribute access goes through the checked accessors below. While an
/// access scope is active they consult each particle's lock marks, so an
/// undeclared read or write fails at the point of access with
/// [`ModelError::ReadLocked`] or [`ModelError::WriteLocked`].
///
/// Adding and removing particles or containers is reserved to
/// [`Model`](super::model::Model), which keeps derivatives, extra edges and the
/// generation in step. Score states get the store but cannot change its
/// structure:
///
/// ```compile_fail
/// use integra::core::models::model::Model;
///
/// let mut model = Model::new();
/// let p = model.add_particle("p");
/// model.particles_mut().remove_particle(p);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    particles: SlotMap<ParticleId, Particle>,
    containers: SlotMap<ContainerId, Container>,
    frozen: bool,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_particle(&mut self, name: &str) -> ParticleId {
        self.particles.insert(Particle::new(name))
    }

    /// Removes a particle and drops it from every container that lists it.
    ///
    /// # Errors
    ///
    /// While the structure is frozen, [`ModelError::WriteLocked`] for a
    /// write-locked particle and [`ModelError::StructureLocked`] otherwise.
    pub(crate) fn remove_particle(&mut self, id: ParticleId) -> Result<Option<Particle>, ModelError> {
        if self.frozen {
            if let Some(particle) = self.particles.get(id) {
                if particle.write_locked {
                    return Err(ModelError::WriteLocked {
                        particle: id,
                        particle_name: particle.name.clone(),
                    });
                }
            }
            return Err(ModelError::StructureLocked("remove a particle"));
        }
        let Some(particle) = self.particles.remove(id) else {
            return Ok(None);
        };
        for (_, container) in self.containers.iter_mut() {
            container.remove_member(id);
        }
        Ok(Some(particle))
    }

    pub fn contains_particle(&self, id: ParticleId) -> bool {
        self.particles.contains_key(id)
    }

    pub fn number_of_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn particle_ids(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.particles.keys()
    }

    /// Name of a particle. Names are identity, not state, so this is never
    /// subject to access checks.
    pub fn particle_name(&self, id: ParticleId) -> Option<&str> {
        self.particles.get(id).map(|p| p.name.as_str())
    }

    /// Borrows a particle for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownParticle`] if the particle does not exist
    /// and [`ModelError::ReadLocked`] if it is outside the active read set.
    pub fn particle(&self, id: ParticleId) -> Result<&Particle, ModelError> {
        let particle = self.lookup(id)?;
        if particle.read_locked {
            return Err(ModelError::ReadLocked {
                particle: id,
                particle_name: particle.name.clone(),
            });
        }
        Ok(particle)
    }

    /// Borrows a particle for writing.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownParticle`] if the particle does not exist
    /// and [`ModelError::WriteLocked`] if it is outside the active write set.
    pub fn particle_mut(&mut self, id: ParticleId) -> Result<&mut Particle, ModelError> {
        let particle = self
            .particles
            .get_mut(id)
            .ok_or(ModelError::UnknownParticle(id))?;
        if particle.write_locked {
            return Err(ModelError::WriteLocked {
                particle: id,
                particle_name: particle.name.clone(),
            });
        }
        Ok(particle)
    }

    pub fn get<T: AttributeValue>(&self, id: ParticleId, key: AttributeKey<T>) -> Result<T, ModelError> {
        let particle = self.particle(id)?;
        particle
            .get(key)
            .cloned()
            .ok_or_else(|| ModelError::MissingAttribute {
                particle: id,
                particle_name: particle.name.clone(),
                key: key.name(),
            })
    }

    pub fn try_get<T: AttributeValue>(
        &self,
        id: ParticleId,
        key: AttributeKey<T>,
    ) -> Result<Option<T>, ModelError> {
        Ok(self.particle(id)?.get(key).cloned())
    }

    pub fn has<T: AttributeValue>(&self, id: ParticleId, key: AttributeKey<T>) -> Result<bool, ModelError> {
        Ok(self.particle(id)?.has(key))
    }

    pub fn set<T: AttributeValue>(
        &mut self,
        id: ParticleId,
        key: AttributeKey<T>,
        value: T,
    ) -> Result<(), ModelError> {
        self.particle_mut(id)?.set(key, value);
        Ok(())
    }

    pub fn remove_attribute<T: AttributeValue>(
        &mut self,
        id: ParticleId,
        key: AttributeKey<T>,
    ) -> Result<Option<T>, ModelError> {
        Ok(self.particle_mut(id)?.remove(key))
    }

    pub(crate) fn add_container(&mut self, container: Container) -> ContainerId {
        self.containers.insert(container)
    }

    pub(crate) fn remove_container(&mut self, id: ContainerId) -> Result<Option<Container>, ModelError> {
        if self.frozen {
            return Err(ModelError::StructureLocked("remove a container"));
        }
        Ok(self.containers.remove(id))
    }

    pub fn contains_container(&self, id: ContainerId) -> bool {
        self.containers.contains_key(id)
    }

    pub fn container(&self, id: ContainerId) -> Result<&Container, ModelError> {
        self.containers
            .get(id)
            .ok_or(ModelError::UnknownContainer(id))
    }

    pub(crate) fn container_mut(&mut self, id: ContainerId) -> Result<&mut Container, ModelError> {
        if self.frozen {
            return Err(ModelError::StructureLocked("change container membership"));
        }
        self.containers
            .get_mut(id)
            .ok_or(ModelError::UnknownContainer(id))
    }

    pub fn container_ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.containers.keys()
    }

    /// Read check used by code that touches per-particle data stored outside
    /// the attribute tables (derivatives).
    pub(crate) fn check_readable(&self, id: ParticleId) -> Result<(), ModelError> {
        self.particle(id).map(|_| ())
    }

    pub(crate) fn check_writable(&self, id: ParticleId) -> Result<(), ModelError> {
        let particle = self.lookup(id)?;
        if particle.write_locked {
            return Err(ModelError::WriteLocked {
                particle: id,
                particle_name: particle.name.clone(),
            });
        }
        Ok(())
    }

    /// Marks every particle outside `readable` as read-locked and every
    /// particle outside `writable` as write-locked.
    pub(crate) fn lock_all_except(
        &mut self,
        readable: &HashSet<ParticleId>,
        writable: &HashSet<ParticleId>,
    ) {
        for (id, particle) in self.particles.iter_mut() {
            particle.read_locked = !readable.contains(&id);
            particle.write_locked = !writable.contains(&id);
        }
        self.frozen = true;
    }

    /// Freezes the structure without setting any lock marks.
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Clears every lock mark and unfreezes the structure.
    pub(crate) fn clear_locks(&mut self) {
        self.frozen = false;
        for (_, particle) in self.particles.iter_mut() {
            particle.read_locked = false;
            particle.write_locked = false;
        }
    }

    fn lookup(&self, id: ParticleId) -> Result<&Particle, ModelError> {
        self.particles.get(id).ok_or(ModelError::UnknownParticle(id))
    }
}
