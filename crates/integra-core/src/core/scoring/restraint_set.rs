use crate::core::models::error::ModelError;
use crate::core::models::ids::{RestraintId, RestraintSetId};
use slotmap::SlotMap;

/// A weighted node of the restraint-set tree.
///
/// Sets hold restraints and child sets. The effective weight of a restraint is
/// the product of the weights along the path from the root set, times the
/// restraint's own weight.
#[derive(Debug, Clone, PartialEq)]
pub struct RestraintSet {
    pub name: String,
    weight: f64,
    restraints: Vec<RestraintId>,
    children: Vec<RestraintSetId>,
}

impl RestraintSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weight: 1.0,
            restraints: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    pub fn restraints(&self) -> &[RestraintId] {
        &self.restraints
    }

    pub fn children(&self) -> &[RestraintSetId] {
        &self.children
    }

    pub fn add_restraint(&mut self, restraint: RestraintId) -> bool {
        if self.restraints.contains(&restraint) {
            return false;
        }
        self.restraints.push(restraint);
        true
    }

    pub fn remove_restraint(&mut self, restraint: RestraintId) -> bool {
        let before = self.restraints.len();
        self.restraints.retain(|&r| r != restraint);
        before != self.restraints.len()
    }

    pub(crate) fn add_child(&mut self, child: RestraintSetId) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    pub(crate) fn remove_child(&mut self, child: RestraintSetId) -> bool {
        let before = self.children.len();
        self.children.retain(|&c| c != child);
        before != self.children.len()
    }
}

/// Flattens the tree below `root` into `(restraint, effective weight)` pairs
/// in depth-first order. Leaves whose effective weight is zero are skipped.
pub fn flatten(
    sets: &SlotMap<RestraintSetId, RestraintSet>,
    root: RestraintSetId,
    restraint_weight: impl Fn(RestraintId) -> Result<f64, ModelError>,
) -> Result<Vec<(RestraintId, f64)>, ModelError> {
    let mut out = Vec::new();
    let mut stack = vec![(root, 1.0)];
    while let Some((id, inherited)) = stack.pop() {
        let set = sets.get(id).ok_or(ModelError::UnknownRestraintSet(id))?;
        let weight = inherited * set.weight;
        if weight == 0.0 {
            continue;
        }
        for &restraint in &set.restraints {
            let effective = weight * restraint_weight(restraint)?;
            if effective != 0.0 {
                out.push((restraint, effective));
            }
        }
        for &child in set.children.iter().rev() {
            stack.push((child, weight));
        }
    }
    Ok(out)
}

/// Returns `true` if `candidate` is `ancestor` or lies below it.
pub(crate) fn is_descendant(
    sets: &SlotMap<RestraintSetId, RestraintSet>,
    ancestor: RestraintSetId,
    candidate: RestraintSetId,
) -> bool {
    let mut stack = vec![ancestor];
    while let Some(id) = stack.pop() {
        if id == candidate {
            return true;
        }
        if let Some(set) = sets.get(id) {
            stack.extend(set.children.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restraint_ids(n: usize) -> Vec<RestraintId> {
        let mut map: SlotMap<RestraintId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn flatten_multiplies_weights_down_the_tree() {
        let r = restraint_ids(3);
        let mut sets: SlotMap<RestraintSetId, RestraintSet> = SlotMap::with_key();
        let root = sets.insert(RestraintSet::new("root"));
        let child = sets.insert(RestraintSet::new("child"));
        sets[root].add_restraint(r[0]);
        sets[root].add_child(child);
        sets[child].set_weight(0.5);
        sets[child].add_restraint(r[1]);
        sets[child].add_restraint(r[2]);

        let flat = flatten(&sets, root, |id| Ok(if id == r[2] { 4.0 } else { 1.0 })).unwrap();
        assert_eq!(flat, vec![(r[0], 1.0), (r[1], 0.5), (r[2], 2.0)]);
    }

    #[test]
    fn zero_weight_sets_and_restraints_are_skipped() {
        let r = restraint_ids(2);
        let mut sets: SlotMap<RestraintSetId, RestraintSet> = SlotMap::with_key();
        let root = sets.insert(RestraintSet::new("root"));
        let muted = sets.insert(RestraintSet::new("muted"));
        sets[root].add_restraint(r[0]);
        sets[root].add_child(muted);
        sets[muted].set_weight(0.0);
        sets[muted].add_restraint(r[1]);

        let flat = flatten(&sets, root, |id| Ok(if id == r[0] { 0.0 } else { 1.0 })).unwrap();
        assert!(flat.is_empty());
    }

    #[test]
    fn descendant_check_follows_children() {
        let mut sets: SlotMap<RestraintSetId, RestraintSet> = SlotMap::with_key();
        let a = sets.insert(RestraintSet::new("a"));
        let b = sets.insert(RestraintSet::new("b"));
        let c = sets.insert(RestraintSet::new("c"));
        sets[a].add_child(b);
        sets[b].add_child(c);
        assert!(is_descendant(&sets, a, c));
        assert!(!is_descendant(&sets, c, a));
    }
}
