//! Word expansion: brace items, tilde, parameter operations, command
//! and process substitution, arithmetic, IFS splitting, pattern
//! compilation and transforms. The pipeline itself lives in `word`.

pub mod brace;
pub mod param;
pub mod pattern;
pub mod positional;
pub mod quote;
pub mod split;
pub mod tilde;
pub mod word;
