//! service-core: shared HTTP plumbing for the drive services.
pub mod error;
pub mod middleware;
pub mod observability;
