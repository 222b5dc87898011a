//! Abstract syntax tree for shell scripts.

pub mod types;

pub use types::*;
