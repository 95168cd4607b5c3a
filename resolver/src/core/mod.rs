//! Pure, deterministic resolution logic.
//!
//! Nothing in this module performs I/O or awaits; every function is a
//! deterministic mapping over immutable snapshots. The async pieces
//! (refresh queue, session orchestration) live at the crate root.

pub mod classifier;
pub mod codec;
pub mod constraint;
pub mod field;
pub mod resolver;
pub mod state;
pub mod ui;
pub mod view;
