use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    pub struct ParticleId;
    pub struct ContainerId;
    pub struct ScoreStateId;
    pub struct RestraintId;
    pub struct RestraintSetId;
}

/// Identity of any object that can take part in dependency resolution.
///
/// Dependency graphs, extra dependency edges and diagnostics all refer to
/// objects through this tagged union rather than through the concrete stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Particle(ParticleId),
    Container(ContainerId),
    ScoreState(ScoreStateId),
    Restraint(RestraintId),
}

impl ObjectId {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectId::Particle(_) => ObjectKind::Particle,
            ObjectId::Container(_) => ObjectKind::Container,
            ObjectId::ScoreState(_) => ObjectKind::ScoreState,
            ObjectId::Restraint(_) => ObjectKind::Restraint,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Particle,
    Container,
    ScoreState,
    Restraint,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ObjectKind::Particle => "particle",
            ObjectKind::Container => "container",
            ObjectKind::ScoreState => "score state",
            ObjectKind::Restraint => "restraint",
        };
        f.write_str(label)
    }
}

impl From<ParticleId> for ObjectId {
    fn from(id: ParticleId) -> Self {
        ObjectId::Particle(id)
    }
}

impl From<ContainerId> for ObjectId {
    fn from(id: ContainerId) -> Self {
        ObjectId::Container(id)
    }
}

impl From<ScoreStateId> for ObjectId {
    fn from(id: ScoreStateId) -> Self {
        ObjectId::ScoreState(id)
    }
}

impl From<RestraintId> for ObjectId {
    fn from(id: RestraintId) -> Self {
        ObjectId::Restraint(id)
    }
}
