//! # grantflow-contracts
//!
//! Shared types and error contracts for the grantflow request coordinator.
//!
//! Every crate in the workspace imports from here. No coordination logic
//! lives in this crate, only data definitions, their folds, and the error
//! type.

pub mod batch;
pub mod capability;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod outcome;
