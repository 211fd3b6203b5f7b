//! # Model
//!
//! The entity store and everything registered with it.
//!
//! - [`ids`] - slotmap keys and the [`ids::ObjectId`] tagged union
//! - [`keys`] - typed attribute keys
//! - [`particle`] / [`container`] - the stored entities
//! - [`store`] - [`store::ParticleStore`], the checked attribute accessors
//! - [`model`] - [`model::Model`], score states, restraints and restraint sets
//! - [`error`] - [`error::ModelError`]

pub mod container;
pub mod error;
pub mod ids;
pub mod keys;
pub mod model;
pub mod particle;
pub mod store;
