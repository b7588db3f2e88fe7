//! Test doubles for the host traits.

pub mod mocks;

pub use mocks::{MockStore, RecordingNotifier, StaticQuery};
