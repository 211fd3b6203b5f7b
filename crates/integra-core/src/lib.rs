//! # Integra Core Library
//!
//! The evaluation engine of a model-evaluation platform: particles carrying typed
//! attributes, score states that derive new attributes from existing ones, and
//! restraints that score the result, all run in dependency order with optional
//! derivative propagation.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** The model store (`Model`, `ParticleStore`), typed
//!   attribute keys, and the scoring contracts (`ScoreState`, `Restraint`,
//!   `DerivativeAccumulator`, restraint sets).
//!
//! - **[`engine`]: The Logic Core.** Builds the dependency graph from declared
//!   inputs and outputs, orders and prunes it, drives the staged
//!   before/evaluate/after pipeline, and verifies at the point of access that every
//!   call only touches what it declared.
//!
//! - **[`workflows`]: The Public API.** Reusable scoring functions for optimizers and
//!   samplers, caching dependency resolution across evaluations.
//!
//! ```
//! use integra::core::models::keys::FloatKey;
//! use integra::core::models::model::Model;
//!
//! const X: FloatKey = FloatKey::new("x");
//!
//! let mut model = Model::new();
//! let p = model.add_particle("p");
//! model.particles_mut().set(p, X, 1.0).unwrap();
//! assert_eq!(model.particles().get(p, X).unwrap(), 1.0);
//! ```

pub mod core;
pub mod engine;
pub mod workflows;
