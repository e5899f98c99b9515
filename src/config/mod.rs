//! # wordpack Configuration Module
//!
//! This module centralizes the numeric configuration of the crate. Constants
//! that depend on each other are co-located and their relationships are
//! enforced through compile-time assertions.
//!
//! ## Module Organization
//!
//! - [`constants`]: Word geometry, capacity limits and sizing defaults
//!
//! Runtime configuration of an individual storage (capacity, transactional
//! tracking, arity, default initialization, sizing strategy) lives in
//! [`crate::storage::StorageBuilder`].

pub mod constants;
pub use constants::*;
