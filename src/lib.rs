pub mod core;
pub mod output;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `deploystep::manifest` instead of `deploystep::core::manifest`
pub use core::*;
pub use utils::*;
