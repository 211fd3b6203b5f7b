use integra::core::models::ids::{ObjectId, ParticleId, RestraintId, ScoreStateId};
use integra::core::models::model::Model;
use integra::core::models::store::ParticleStore;
use integra::core::scoring::accumulator::DerivativeAccumulator;
use integra::core::scoring::error::ScoringError;
use integra::core::scoring::traits::{Restraint, ScoreState};
use integra::engine::graph::builder;
use integra::engine::graph::order::ModelDependencies;
use integra::engine::graph::prune::prune;
use integra::engine::graph::query::get_dependent;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

struct Derive {
    inputs: Vec<ParticleId>,
    output: ParticleId,
}

impl ScoreState for Derive {
    fn name(&self) -> &str {
        "derive"
    }
    fn input_particles(&self) -> Vec<ParticleId> {
        self.inputs.clone()
    }
    fn output_particles(&self) -> Vec<ParticleId> {
        vec![self.output]
    }
    fn before_evaluate(&mut self, _particles: &mut ParticleStore) -> Result<(), ScoringError> {
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

struct Reads(Vec<ParticleId>);

impl Restraint for Reads {
    fn name(&self) -> &str {
        "reads"
    }
    fn input_particles(&self) -> Vec<ParticleId> {
        self.0.clone()
    }
    fn evaluate(
        &self,
        _particles: &ParticleStore,
        _derivatives: Option<&mut DerivativeAccumulator<'_>>,
    ) -> Result<f64, ScoringError> {
        Ok(0.0)
    }
}

#[derive(Debug, Clone)]
struct Layout {
    particles: usize,
    /// (output index, input indices); inputs above the output are dropped so
    /// every layout is acyclic.
    states: Vec<(usize, Vec<usize>)>,
    restraints: Vec<Vec<usize>>,
}

struct Built {
    model: Model,
    particles: Vec<ParticleId>,
    states: Vec<(ScoreStateId, Vec<ParticleId>, ParticleId)>,
    restraints: Vec<RestraintId>,
}

fn layout() -> impl Strategy<Value = Layout> {
    (2usize..8).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((1..n, prop::collection::vec(0..n, 0..3)), 0..5),
            prop::collection::vec(prop::collection::vec(0..n, 1..4), 1..5),
        )
            .prop_map(|(particles, states, restraints)| Layout {
                particles,
                states,
                restraints,
            })
    })
}

fn build_model(layout: &Layout) -> Built {
    let mut model = Model::new();
    let particles: Vec<ParticleId> = (0..layout.particles)
        .map(|i| model.add_particle(&format!("p{i}")))
        .collect();
    let mut states = Vec::new();
    for (out, inputs) in &layout.states {
        let inputs: Vec<ParticleId> = inputs
            .iter()
            .filter(|&&i| i < *out)
            .map(|&i| particles[i])
            .collect();
        let output = particles[*out];
        let id = model.add_score_state(Derive {
            inputs: inputs.clone(),
            output,
        });
        states.push((id, inputs, output));
    }
    let restraints = layout
        .restraints
        .iter()
        .map(|reads| model.add_restraint(Reads(reads.iter().map(|&i| particles[i]).collect())))
        .collect();
    Built {
        model,
        particles,
        states,
        restraints,
    }
}

fn all_score_states(built: &Built) -> Vec<ScoreStateId> {
    built.states.iter().map(|(id, ..)| *id).collect()
}

proptest! {
    #[test]
    fn building_twice_gives_the_same_graph(layout in layout()) {
        let built = build_model(&layout);
        let states = all_score_states(&built);
        let first = builder::build(&built.model, &states, &built.restraints).unwrap();
        let second = builder::build(&built.model, &states, &built.restraints).unwrap();
        prop_assert_eq!(first.edges(), second.edges());

        let a = ModelDependencies::compute(&built.model).unwrap();
        let b = ModelDependencies::compute(&built.model).unwrap();
        prop_assert_eq!(a.ordered_score_states(), b.ordered_score_states());
    }

    #[test]
    fn writers_run_before_readers(layout in layout()) {
        let built = build_model(&layout);
        let dependencies = ModelDependencies::compute(&built.model).unwrap();
        let order = dependencies.ordered_score_states();
        let position = |id: ScoreStateId| order.iter().position(|&s| s == id);
        for (writer, _, output) in &built.states {
            for (reader, inputs, _) in &built.states {
                if writer != reader && inputs.contains(output) {
                    prop_assert!(position(*writer) < position(*reader));
                }
            }
        }
    }

    #[test]
    fn pruning_never_grows_and_keeps_reachability(layout in layout()) {
        let built = build_model(&layout);
        let states = all_score_states(&built);
        let graph = builder::build(&built.model, &states, &built.restraints).unwrap();
        let pruned = prune(&graph);
        prop_assert!(pruned.vertex_count() <= graph.vertex_count());
        prop_assert!(pruned.edge_count() <= graph.edge_count());

        let none = HashSet::new();
        for object in pruned.objects() {
            let before: BTreeSet<ObjectId> = get_dependent(&graph, object, &none);
            let after: BTreeSet<ObjectId> = get_dependent(&pruned, object, &none);
            let surviving: BTreeSet<ObjectId> =
                before.into_iter().filter(|o| pruned.contains(*o)).collect();
            prop_assert_eq!(after, surviving);
        }
    }

    #[test]
    fn barriers_only_shrink_the_dependent_set(
        layout in layout(),
        start in 0usize..8,
        walls in prop::collection::vec(0usize..8, 0..4),
    ) {
        let built = build_model(&layout);
        let states = all_score_states(&built);
        let graph = builder::build(&built.model, &states, &built.restraints).unwrap();
        let start = ObjectId::from(built.particles[start % built.particles.len()]);
        let barrier: HashSet<ObjectId> = walls
            .iter()
            .map(|&i| ObjectId::from(built.particles[i % built.particles.len()]))
            .collect();

        let free: BTreeSet<RestraintId> = get_dependent(&graph, start, &HashSet::new());
        let walled: BTreeSet<RestraintId> = get_dependent(&graph, start, &barrier);
        prop_assert!(walled.is_subset(&free));

        let mut with_start = barrier.clone();
        with_start.insert(start);
        let exempt: BTreeSet<RestraintId> = get_dependent(&graph, start, &with_start);
        prop_assert_eq!(exempt, walled);
    }
}
