//! Peer sessions
//!
//! A [`PeerSession`] binds one remote identity to one transport connection
//! and one pair of audio pipelines. Audio devices come from an
//! [`AudioDeviceProvider`] so the session never reaches for globals.

pub mod devices;
pub mod peer;

pub use devices::{AudioDeviceProvider, MemoryDevices};
pub use peer::{PeerSession, SessionSnapshot};
