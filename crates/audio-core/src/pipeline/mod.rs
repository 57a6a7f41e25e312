//! Capture and playback pipelines
//!
//! Both pipelines carry an `active` flag that is flipped off before any
//! resource is released, so callbacks already in flight become no-ops
//! instead of touching a half-torn-down session.

pub mod capture;
pub mod playback;
pub mod queue;
pub mod reorder;
