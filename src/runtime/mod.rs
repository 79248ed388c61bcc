//! Async storage facade, snapshot dumps, and event stream APIs.

/// Snapshot dump writer and scheduler.
pub mod dump;
/// Event stream types emitted by the facade.
pub mod events;
/// Facade handle, configuration, and error taxonomy.
pub mod handle;
