//! # Workflows Module
//!
//! High-level entry points that tie the model and the evaluation engine together.
//!
//! ## Overview
//!
//! Optimizers and samplers score the same model thousands of times with the same set
//! of restraints. The workflows in this module resolve which score states a set of
//! restraints needs once, reuse that resolution until the model's dependency
//! structure changes, and run each evaluation through the
//! [`Scheduler`](crate::engine::scheduler::Scheduler).
//!
//! ## Architecture
//!
//! - **Scoring Function** ([`scoring_function`]) - a named, reusable scorer over
//!   either the model's restraint-set tree or a fixed list of restraints
//!
//! ## Key Capabilities
//!
//! - **Lazy dependency resolution**: the required score states are recomputed only
//!   when the model's generation or the flattened restraint list changes
//! - **Early exit**: [`scoring_function::ScoringFunction::evaluate_if_good`] lets
//!   restraints stop once the score can no longer be good
//! - **Profiling**: statistics and evaluation counts are kept on the function's own
//!   scheduler

pub mod scoring_function;
