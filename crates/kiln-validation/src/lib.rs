//! Kiln Validation
//!
//! Structural checks over generated Python sources.
//!
//! # Core Concepts
//!
//! - [`ValidatorBattery`]: Registry running every applicable [`Check`]
//! - [`SourceUnit`]: tree-sitter parse of one candidate
//! - [`ModuleIndex`]: Planned and produced modules of a run
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_validation::{ModuleIndex, ValidationInput, ValidatorBattery};
//!
//! let modules = ModuleIndex::from_specs("app", &plan);
//! let issues = ValidatorBattery::with_defaults().validate(&ValidationInput {
//!     spec: &plan[0],
//!     content: &candidate,
//!     modules: &modules,
//! });
//! ```

#![warn(unreachable_pub)]

mod battery;
mod check;
mod checks;
mod error;
mod modules;
mod source;

#[cfg(test)]
mod test_support;

pub use battery::{ValidationInput, ValidatorBattery};
pub use check::{Check, CheckContext};
pub use checks::{DataModelCheck, InterfaceCheck, ReferenceCheck, SyntaxCheck};
pub use error::ValidationError;
pub use modules::ModuleIndex;
pub use source::{
    last_segment, Call, ClassDef, Import, RouteHandler, SourceUnit, SyntaxError, ROUTE_VERBS,
};
