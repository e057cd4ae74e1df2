//! Artifact specifications
//!
//! An [`ArtifactSpec`] names one output file of a run, its category, its
//! dependencies and the parameters its generator needs. Specs are created by
//! the planner and never change afterwards.

use crate::module_path::ModulePath;
use crate::resource::{AttributeType, Features, Persistence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Artifact category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Shared configuration, session and base-model files
    Foundation,
    /// Persistence model of a resource
    Model,
    /// Request/response schemas
    Contract,
    /// Data-access and business logic
    Behavior,
    /// HTTP endpoints
    Interface,
    /// Router wiring and application entry point
    Aggregation,
}

impl ArtifactKind {
    /// Precedence tier of this kind
    #[inline]
    #[must_use]
    pub fn tier(&self) -> Tier {
        match self {
            ArtifactKind::Foundation => Tier::Foundation,
            ArtifactKind::Model
            | ArtifactKind::Contract
            | ArtifactKind::Behavior
            | ArtifactKind::Interface => Tier::Domain,
            ArtifactKind::Aggregation => Tier::Aggregation,
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Foundation => "foundation",
            ArtifactKind::Model => "model",
            ArtifactKind::Contract => "contract",
            ArtifactKind::Behavior => "behavior",
            ArtifactKind::Interface => "interface",
            ArtifactKind::Aggregation => "aggregation",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed precedence tiers; every spec of a lower tier is produced first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Shared infrastructure
    Foundation,
    /// Resource-specific layers
    Domain,
    /// Wiring
    Aggregation,
}

/// Attribute with its resolved type and target-language spellings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAttribute {
    /// Attribute name
    pub name: String,
    /// Resolved type
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Python annotation, e.g. `float`
    pub python_type: String,
    /// SQLAlchemy column type, e.g. `Float`
    pub column_type: String,
}

impl ResolvedAttribute {
    /// Resolve an attribute
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            python_type: attribute_type.python_type().to_string(),
            column_type: attribute_type.column_type().to_string(),
        }
    }
}

/// Structured parameters handed to the content generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Project name
    pub project_name: String,
    /// Resource name, e.g. `widget`
    pub resource: String,
    /// Resource class name, e.g. `Widget`
    pub class_name: String,
    /// Attributes in declaration order
    pub attributes: Vec<ResolvedAttribute>,
    /// Persistence layer
    pub persistence: Persistence,
    /// Feature flags
    pub features: Features,
    /// Target-framework conventions this artifact must follow
    pub conventions: Vec<String>,
}

/// One planned output artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Unique name within a run, e.g. `db-session`
    pub name: String,
    /// Category
    pub kind: ArtifactKind,
    /// Output file path, e.g. `app/models/widget.py`
    pub path: String,
    /// Importable module path
    pub module: ModulePath,
    /// Names of specs that must be produced first
    pub depends_on: BTreeSet<String>,
    /// Generator parameters
    pub context: GenerationContext,
}

impl ArtifactSpec {
    /// Tier of this spec
    #[inline]
    #[must_use]
    pub fn tier(&self) -> Tier {
        self.kind.tier()
    }

    /// Check if this spec declares `name` as a dependency
    #[inline]
    #[must_use]
    pub fn depends_on(&self, name: &str) -> bool {
        self.depends_on.contains(name)
    }

    /// File name without directories, e.g. `widget.py`
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tiers() {
        assert_eq!(ArtifactKind::Foundation.tier(), Tier::Foundation);
        assert_eq!(ArtifactKind::Contract.tier(), Tier::Domain);
        assert_eq!(ArtifactKind::Interface.tier(), Tier::Domain);
        assert_eq!(ArtifactKind::Aggregation.tier(), Tier::Aggregation);
        assert!(Tier::Foundation < Tier::Domain && Tier::Domain < Tier::Aggregation);
    }

    #[test]
    fn resolved_attribute_spellings() {
        let attr = ResolvedAttribute::new("price", AttributeType::Number);
        assert_eq!(attr.python_type, "float");
        assert_eq!(attr.column_type, "Float");
    }

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ArtifactKind::Behavior).unwrap();
        assert_eq!(json, "\"behavior\"");
    }
}
