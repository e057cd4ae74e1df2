//! Kiln Artifact Model
//!
//! Value types shared by every stage of the generate-validate-repair pipeline.
//!
//! # Core Concepts
//!
//! - [`ResourceDescription`]: Caller input naming the resource and its attributes
//! - [`ArtifactSpec`]: One planned output file with its dependencies
//! - [`ValidationIssue`]: Finding produced by the validator battery
//! - [`ArtifactResult`]: Latest candidate, status and issues of one spec
//! - [`ContentHash`]: 32-byte Blake3 hash of generated content
//! - [`ModulePath`]: Dotted import path of a generated file
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_artifact::{Attribute, ResourceDescription};
//!
//! let description = ResourceDescription::new("widget")
//!     .with_attributes(Attribute::parse_list("name:string, price:number")?);
//! description.validate()?;
//! ```

#![warn(unreachable_pub)]

mod hash;
mod issue;
mod module_path;
mod resource;
mod result;
mod spec;

pub use hash::{ContentHash, HashError};
pub use issue::{needs_repair, IssueCategory, Severity, ValidationIssue};
pub use module_path::{ModulePath, PathError};
pub use resource::{
    is_identifier, Attribute, AttributeType, DescriptionError, Features, Persistence,
    ResourceDescription,
};
pub use result::{ArtifactResult, ArtifactStatus};
pub use spec::{ArtifactKind, ArtifactSpec, GenerationContext, ResolvedAttribute, Tier};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
