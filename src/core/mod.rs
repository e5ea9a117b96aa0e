// Ports and ambient plumbing
pub mod config;
pub mod error;
pub mod exec;
pub mod files;
pub mod logging;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Manifest handling
pub mod document;
pub mod manifest;
pub mod strategy;
pub mod substitution;

// Deploy steps
pub mod cloudfoundry;
pub mod transport;
pub mod xs;

pub use error::{Error, ErrorCode, Result};
