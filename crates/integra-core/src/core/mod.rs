//! # Core Module
//!
//! Data model and scoring contracts shared by the engine and the workflows.
//!
//! ## Architecture
//!
//! - **Entity Store** ([`models`]) - particles with typed attributes, containers,
//!   and the [`models::model::Model`] that owns score states, restraints and the
//!   restraint-set tree
//! - **Scoring Interfaces** ([`scoring`]) - the `ScoreState` and `Restraint` traits,
//!   derivative accumulation and restraint sets
//!
//! Nothing in this module knows about evaluation order. Ordering, verification and
//! scheduling are the job of [`crate::engine`].

pub mod models;
pub mod scoring;
