//! Kiln command line
//!
//! - `kiln plan`: print the artifact queue of a resource
//! - `kiln validate`: run the validator battery over one source file
//! - `kiln replay`: run the full pipeline against a directory of fixtures

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod fixture;
pub mod logging;

pub use commands::{cli, CommandOutput};
pub use fixture::FixtureGenerator;
pub use logging::LogFormat;
