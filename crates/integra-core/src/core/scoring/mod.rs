//! # Scoring Interfaces
//!
//! Contracts between the evaluation engine and the scientific code built on
//! top of it. Concrete score states and restraints live outside this crate and
//! plug in through the [`traits::ScoreState`] and [`traits::Restraint`] traits.
//!
//! - [`traits`] - the score state and restraint contracts
//! - [`accumulator`] - weighted, access-checked derivative accumulation
//! - [`restraint_set`] - the weighted restraint-set tree
//! - [`error`] - errors returned by implementations

pub mod accumulator;
pub mod error;
pub mod restraint_set;
pub mod traits;
