//! `fmgen` command line host.
//!
//! Provides the filesystem implementations of the host traits and the
//! commands that drive [`fmgen_pipeline::FrontmatterSync`] over a vault.

pub mod cli;
pub mod commands;
pub mod diff;
pub mod host;
pub mod logging;
