//! # Engine Module
//!
//! The evaluation engine: everything that decides in which order score states
//! and restraints run, runs them, and checks that their declared dependencies
//! are honest.
//!
//! ## Architecture
//!
//! - **Dependency Graph** ([`graph`]) - construction, ordering, reachability queries
//!   and pruning
//! - **Access Verification** ([`verify`]) - per-call read/write lock marks that catch
//!   undeclared attribute access at the point of access
//! - **Evaluation Session** ([`session`]) - the staged before/evaluate/after state
//!   machine, reset on every exit path
//! - **Scheduling** ([`scheduler`]) - full evaluations with weighting, early exit and
//!   derivative propagation
//! - **Statistics** ([`statistics`]) - optional per-call timing and score tracking
//! - **Configuration** ([`config`]) - verification level, statistics and the global
//!   score budget
//! - **Error Handling** ([`error`]) - the engine's error taxonomy
//!
//! ## Key Guarantees
//!
//! - Score states run forward in dependency order and backward in exactly the
//!   reverse order
//! - Requesting derivatives never changes the returned scores
//! - Verification is strictly additive: a correct model evaluates identically with
//!   and without it

pub mod config;
pub mod error;
pub mod graph;
pub mod scheduler;
pub mod session;
pub mod statistics;
pub mod verify;
