//! Resource Reconciler SDK
//!
//! Public contract of the resource reconciler:
//!
//! - [`ResourceReconcilerClient`] - API trait for callers
//! - [`ResourceAddress`] - where a resource lives, and path parsing
//! - [`ResourceDocument`] - desired content plus its metadata envelope
//! - [`WaitTarget`] - dependencies awaited after a create
//! - [`ReconcilerError`] - error types
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod address;
pub mod api;
pub mod error;
mod manifest;
pub mod models;
pub mod wait_for;

pub use address::{
    DEFAULT_API_PATH, DEFAULT_NAMESPACE, NAMESPACES_COLLECTION, ResourceAddress,
};
pub use api::ResourceReconcilerClient;
pub use error::{AttemptFailure, ReconcilerError};
pub use models::{Encoding, ResourceDocument};
pub use wait_for::WaitTarget;
