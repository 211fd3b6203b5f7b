use super::ids::ParticleId;

/// An aggregate of particles that acts as a single dependency unit.
///
/// Containers are opaque vertices in dependency graphs: a restraint that reads
/// "all currently selected atoms" depends on the container, not on each
/// member. A container may be backed by a particle, in which case access
/// verification treats it as that particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    members: Vec<ParticleId>,
    backing_particle: Option<ParticleId>,
}

impl Container {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            backing_particle: None,
        }
    }

    pub fn with_members(name: &str, members: Vec<ParticleId>) -> Self {
        Self {
            name: name.to_string(),
            members,
            backing_particle: None,
        }
    }

    pub fn backed_by(name: &str, particle: ParticleId) -> Self {
        Self {
            name: name.to_string(),
            members: Vec::new(),
            backing_particle: Some(particle),
        }
    }

    pub fn members(&self) -> &[ParticleId] {
        &self.members
    }

    pub fn backing_particle(&self) -> Option<ParticleId> {
        self.backing_particle
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, particle: ParticleId) -> bool {
        self.members.contains(&particle)
    }

    /// Adds a member. Adding a particle that is already a member is a no-op.
    pub fn add_member(&mut self, particle: ParticleId) {
        if !self.members.contains(&particle) {
            self.members.push(particle);
        }
    }

    pub fn remove_member(&mut self, particle: ParticleId) -> bool {
        let before = self.members.len();
        self.members.retain(|&id| id != particle);
        before != self.members.len()
    }

    pub fn set_members(&mut self, members: Vec<ParticleId>) {
        self.members = members;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<ParticleId> {
        let mut map: SlotMap<ParticleId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn add_member_is_idempotent() {
        let p = ids(1)[0];
        let mut container = Container::new("selection");
        container.add_member(p);
        container.add_member(p);
        assert_eq!(container.len(), 1);
        assert!(container.contains(p));
    }

    #[test]
    fn remove_member_reports_whether_anything_changed() {
        let ps = ids(2);
        let mut container = Container::with_members("pair", ps.clone());
        assert!(container.remove_member(ps[0]));
        assert!(!container.remove_member(ps[0]));
        assert_eq!(container.members(), &[ps[1]]);
    }

    #[test]
    fn backed_container_exposes_its_particle() {
        let p = ids(1)[0];
        let container = Container::backed_by("rigid body", p);
        assert_eq!(container.backing_particle(), Some(p));
        assert!(container.is_empty());
    }
}
