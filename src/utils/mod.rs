//! Generic utility primitives with zero domain knowledge.
//!
//! - `args` - Trailing `--key value` flag parsing
//! - `shell` - Shell escaping and quoting
//! - `validation` - Input validation helpers

pub mod args;
pub mod shell;
pub mod validation;
