use crate::core::models::ids::{RestraintId, ScoreStateId};
use indexmap::IndexMap;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreStateStats {
    pub name: String,
    pub calls: u64,
    pub before_time: Duration,
    pub after_time: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestraintStats {
    pub name: String,
    pub calls: u64,
    pub time: Duration,
    pub last_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

impl RestraintStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: 0,
            time: Duration::ZERO,
            last_score: 0.0,
            min_score: f64::INFINITY,
            max_score: f64::NEG_INFINITY,
        }
    }
}

/// Profiling data gathered while `gather_statistics` is enabled.
///
/// Entries are kept in first-seen order, which for a fixed evaluation request
/// is the evaluation order.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    score_states: IndexMap<ScoreStateId, ScoreStateStats>,
    restraints: IndexMap<RestraintId, RestraintStats>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_before(&mut self, id: ScoreStateId, name: &str, elapsed: Duration) {
        let entry = self.score_states.entry(id).or_insert_with(|| ScoreStateStats {
            name: name.to_string(),
            ..Default::default()
        });
        entry.calls += 1;
        entry.before_time += elapsed;
    }

    pub(crate) fn record_after(&mut self, id: ScoreStateId, name: &str, elapsed: Duration) {
        let entry = self.score_states.entry(id).or_insert_with(|| ScoreStateStats {
            name: name.to_string(),
            ..Default::default()
        });
        entry.after_time += elapsed;
    }

    pub(crate) fn record_restraint(
        &mut self,
        id: RestraintId,
        name: &str,
        elapsed: Duration,
        score: f64,
    ) {
        let entry = self
            .restraints
            .entry(id)
            .or_insert_with(|| RestraintStats::new(name));
        entry.calls += 1;
        entry.time += elapsed;
        entry.last_score = score;
        entry.min_score = entry.min_score.min(score);
        entry.max_score = entry.max_score.max(score);
    }

    pub fn score_state(&self, id: ScoreStateId) -> Option<&ScoreStateStats> {
        self.score_states.get(&id)
    }

    pub fn restraint(&self, id: RestraintId) -> Option<&RestraintStats> {
        self.restraints.get(&id)
    }

    pub fn score_states(&self) -> impl Iterator<Item = &ScoreStateStats> {
        self.score_states.values()
    }

    pub fn restraints(&self) -> impl Iterator<Item = &RestraintStats> {
        self.restraints.values()
    }

    pub fn is_empty(&self) -> bool {
        self.score_states.is_empty() && self.restraints.is_empty()
    }

    pub fn clear(&mut self) {
        self.score_states.clear();
        self.restraints.clear();
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Score states:")?;
        for s in self.score_states.values() {
            let calls = s.calls.max(1) as f64;
            writeln!(
                f,
                "  {}: {} calls, before {:.6}s avg, after {:.6}s avg",
                s.name,
                s.calls,
                s.before_time.as_secs_f64() / calls,
                s.after_time.as_secs_f64() / calls
            )?;
        }
        writeln!(f, "Restraints:")?;
        for r in self.restraints.values() {
            let calls = r.calls.max(1) as f64;
            writeln!(
                f,
                "  {}: {} calls, {:.6}s avg, score last {} min {} max {}",
                r.name,
                r.calls,
                r.time.as_secs_f64() / calls,
                r.last_score,
                r.min_score,
                r.max_score
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn restraint_scores_track_extremes() {
        let mut ids: SlotMap<RestraintId, ()> = SlotMap::with_key();
        let r = ids.insert(());
        let mut stats = Statistics::new();
        for score in [3.0, -1.0, 2.0] {
            stats.record_restraint(r, "distance", Duration::from_millis(1), score);
        }
        let entry = stats.restraint(r).unwrap();
        assert_eq!(entry.calls, 3);
        assert_eq!(entry.last_score, 2.0);
        assert_eq!(entry.min_score, -1.0);
        assert_eq!(entry.max_score, 3.0);
        assert_eq!(entry.time, Duration::from_millis(3));
    }

    #[test]
    fn score_state_calls_count_forward_passes() {
        let mut ids: SlotMap<ScoreStateId, ()> = SlotMap::with_key();
        let s = ids.insert(());
        let mut stats = Statistics::new();
        stats.record_before(s, "centroid", Duration::from_millis(2));
        stats.record_after(s, "centroid", Duration::from_millis(1));
        let entry = stats.score_state(s).unwrap();
        assert_eq!(entry.calls, 1);
        assert_eq!(entry.before_time, Duration::from_millis(2));
        assert_eq!(entry.after_time, Duration::from_millis(1));
    }

    #[test]
    fn summary_lists_every_entry() {
        let mut states: SlotMap<ScoreStateId, ()> = SlotMap::with_key();
        let mut restraints: SlotMap<RestraintId, ()> = SlotMap::with_key();
        let mut stats = Statistics::new();
        stats.record_before(states.insert(()), "centroid", Duration::ZERO);
        stats.record_restraint(restraints.insert(()), "distance", Duration::ZERO, 1.0);

        let summary = stats.to_string();
        assert!(summary.contains("centroid: 1 calls"));
        assert!(summary.contains("distance: 1 calls"));
        stats.clear();
        assert!(stats.is_empty());
    }
}
