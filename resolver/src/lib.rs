//! Deterministic state resolution for the mortality-charts explorer.
//!
//! This crate implements the configuration core of an interactive
//! data-exploration UI: a priority-based rules engine mapping a flat
//! field state to and from URL query strings, enforcing cross-field
//! business rules and view constraints, deriving per-field UI
//! metadata, and serializing the asynchronous data refreshes a change
//! triggers. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (codec, constraints,
//!   views, UI derivation, resolution, classification). No I/O, fully
//!   testable in isolation.
//! - **[`catalog`]**: The concrete field/view/constraint configuration
//!   plus eager startup validation.
//! - **[`queue`] / [`session`]**: Async orchestration — the coalescing
//!   refresh queue and the per-session wiring around it.
//!
//! Chart rendering and the statistical pipeline are external
//! collaborators; this crate only consumes and produces plain data
//! structures at that boundary.

pub mod catalog;
pub mod core;
pub mod logging;
pub mod queue;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
