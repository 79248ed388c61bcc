//! Pure canvas logic: grid codec, validator, and render cache.

/// Byte-budgeted LRU render cache.
pub mod cache;
/// Text grid encode/decode and border trimming.
pub mod grid;
/// Strict and lenient candidate validation.
pub mod validate;
