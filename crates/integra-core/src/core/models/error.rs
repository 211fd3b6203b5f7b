use super::ids::{ContainerId, ObjectId, ParticleId, RestraintId, RestraintSetId, ScoreStateId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Particle {0:?} is not owned by this model")]
    UnknownParticle(ParticleId),

    #[error("Container {0:?} is not owned by this model")]
    UnknownContainer(ContainerId),

    #[error("Score state {0:?} is not registered with this model")]
    UnknownScoreState(ScoreStateId),

    #[error("Restraint {0:?} is not registered with this model")]
    UnknownRestraint(RestraintId),

    #[error("Restraint set {0:?} is not registered with this model")]
    UnknownRestraintSet(RestraintSetId),

    #[error("Restraint set {child:?} cannot be placed under its own descendant {parent:?}")]
    RestraintSetCycle {
        child: RestraintSetId,
        parent: RestraintSetId,
    },

    #[error("Cannot {0} while an evaluation holds access locks")]
    StructureLocked(&'static str),

    #[error("Extra dependency edge from {0:?} to itself")]
    SelfDependency(ObjectId),

    #[error("Invalid {what} {value}")]
    InvalidParameter { what: &'static str, value: f64 },

    #[error("Particle '{particle_name}' has no attribute '{key}'")]
    MissingAttribute {
        particle: ParticleId,
        particle_name: String,
        key: &'static str,
    },

    #[error("Particle '{particle_name}' is not in the declared read set")]
    ReadLocked {
        particle: ParticleId,
        particle_name: String,
    },

    #[error("Particle '{particle_name}' is not in the declared write set")]
    WriteLocked {
        particle: ParticleId,
        particle_name: String,
    },
}

impl ModelError {
    /// Returns `true` for the errors raised by the access verifier's lock marks.
    pub fn is_access_violation(&self) -> bool {
        matches!(
            self,
            ModelError::ReadLocked { .. } | ModelError::WriteLocked { .. }
        )
    }
}
