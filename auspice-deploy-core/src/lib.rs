#![doc = "auspice-deploy-core: core logic library for auspice-deploy."]

//! This crate contains all promotion and snapshot logic for auspice-deploy.
//! CLI glue (argument parsing, process exit codes) lives in the binary crate.
//!
//! # Usage
//! Add this as a dependency for the deploy workflow, object-store contract,
//! key construction and tree annotation code.

pub mod annotate;
pub mod contract;
pub mod deploy;
pub mod keys;
pub mod store;
