//! Domain layer for the resource reconciler.

pub mod diagnostics;
pub mod error;
pub mod local_client;
pub mod outcome;
pub mod retry;
pub mod service;
pub mod transport;

#[cfg(test)]
mod service_test;

pub use error::DomainError;
pub use local_client::ResourceReconcilerLocalClient;
pub use service::Service;
