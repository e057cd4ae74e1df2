//! Resource descriptions
//!
//! The caller-supplied input of a run: which resource to scaffold, its typed
//! attributes, the persistence layer and optional features.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Hard keywords; none of them can name a module, class or field
const KEYWORDS: [&str; 35] = [
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Check whether `s` is a valid Python identifier (ASCII subset, no keyword)
#[inline]
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s) && !KEYWORDS.contains(&s)
}

/// Description of the resource to scaffold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescription {
    /// Project name (display only)
    #[serde(default)]
    pub project_name: String,
    /// Resource name, e.g. `widget`
    pub resource: String,
    /// Declared attributes, in declaration order
    pub attributes: Vec<Attribute>,
    /// Persistence layer the models target
    #[serde(default)]
    pub persistence: Persistence,
    /// Optional features
    #[serde(default)]
    pub features: Features,
}

impl ResourceDescription {
    /// Create a description with no attributes and default options
    #[inline]
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            project_name: String::new(),
            resource: resource.into(),
            attributes: Vec::new(),
            persistence: Persistence::default(),
            features: Features::default(),
        }
    }

    /// With project name
    #[inline]
    #[must_use]
    pub fn with_project(mut self, project_name: impl Into<String>) -> Self {
        self.project_name = project_name.into();
        self
    }

    /// With an attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, type_name));
        self
    }

    /// With attributes
    #[inline]
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = attributes;
        self
    }

    /// With persistence layer
    #[inline]
    #[must_use]
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// With features
    #[inline]
    #[must_use]
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Check the description before any planning happens
    ///
    /// # Errors
    /// - `EmptyResourceName` / `NoAttributes` for an empty description
    /// - `InvalidIdentifier` for names that cannot become Python identifiers
    /// - `DuplicateAttribute` for repeated attribute names
    /// - `UnsupportedAttributeType` for unknown type names
    /// - `ProtectRoutesWithoutAuthentication` for inconsistent features
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let resource = self.resource.trim();
        if resource.is_empty() {
            return Err(DescriptionError::EmptyResourceName);
        }
        if !is_identifier(resource) {
            return Err(DescriptionError::InvalidIdentifier {
                what: "resource",
                value: resource.to_string(),
            });
        }
        if self.attributes.is_empty() {
            return Err(DescriptionError::NoAttributes);
        }

        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !is_identifier(&attribute.name) {
                return Err(DescriptionError::InvalidIdentifier {
                    what: "attribute",
                    value: attribute.name.clone(),
                });
            }
            if !seen.insert(attribute.name.as_str()) {
                return Err(DescriptionError::DuplicateAttribute(attribute.name.clone()));
            }
            attribute.attribute_type()?;
        }

        if self.features.protect_routes && !self.features.authentication {
            return Err(DescriptionError::ProtectRoutesWithoutAuthentication);
        }

        Ok(())
    }

    /// Resource name in `PascalCase`, used for class names
    #[must_use]
    pub fn class_name(&self) -> String {
        self.resource
            .trim()
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().collect::<String>() + chars.as_str()
                })
            })
            .collect()
    }
}

/// One declared attribute
///
/// The type is kept as written so that an unsupported type is reported by
/// validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name
    pub name: String,
    /// Type name as written by the caller
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Attribute {
    /// Create new attribute
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }

    /// Resolve the declared type
    ///
    /// # Errors
    /// Returns `UnsupportedAttributeType` for unknown type names
    pub fn attribute_type(&self) -> Result<AttributeType, DescriptionError> {
        self.type_name
            .parse()
            .map_err(|_| DescriptionError::UnsupportedAttributeType {
                attribute: self.name.clone(),
                type_name: self.type_name.clone(),
            })
    }

    /// Parse the compact `name:type, other:type` notation
    ///
    /// Empty pairs are skipped. Types are not resolved here.
    ///
    /// # Errors
    /// Returns `MalformedAttribute` if a pair is not exactly `name:type`
    pub fn parse_list(input: &str) -> Result<Vec<Self>, DescriptionError> {
        let mut attributes = Vec::new();
        for pair in input.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let parts: Vec<&str> = pair.split(':').collect();
            let [name, type_name] = parts.as_slice() else {
                return Err(DescriptionError::MalformedAttribute(pair.to_string()));
            };
            let (name, type_name) = (name.trim(), type_name.trim());
            if name.is_empty() || type_name.is_empty() {
                return Err(DescriptionError::MalformedAttribute(pair.to_string()));
            }
            attributes.push(Self::new(name, type_name));
        }
        Ok(attributes)
    }
}

/// Supported attribute types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Text,
    Integer,
    Number,
    Boolean,
    DateTime,
    Date,
}

impl AttributeType {
    /// Python annotation for this type
    #[inline]
    #[must_use]
    pub fn python_type(&self) -> &'static str {
        match self {
            AttributeType::String | AttributeType::Text => "str",
            AttributeType::Integer => "int",
            AttributeType::Number => "float",
            AttributeType::Boolean => "bool",
            AttributeType::DateTime => "datetime",
            AttributeType::Date => "date",
        }
    }

    /// SQLAlchemy column type for this type
    #[inline]
    #[must_use]
    pub fn column_type(&self) -> &'static str {
        match self {
            AttributeType::String => "String",
            AttributeType::Text => "Text",
            AttributeType::Integer => "Integer",
            AttributeType::Number => "Float",
            AttributeType::Boolean => "Boolean",
            AttributeType::DateTime => "DateTime",
            AttributeType::Date => "Date",
        }
    }
}

impl FromStr for AttributeType {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(AttributeType::String),
            "text" => Ok(AttributeType::Text),
            "integer" | "int" => Ok(AttributeType::Integer),
            "number" | "float" => Ok(AttributeType::Number),
            "boolean" | "bool" => Ok(AttributeType::Boolean),
            "datetime" => Ok(AttributeType::DateTime),
            "date" => Ok(AttributeType::Date),
            other => Err(DescriptionError::UnsupportedAttributeType {
                attribute: String::new(),
                type_name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::String => "string",
            AttributeType::Text => "text",
            AttributeType::Integer => "integer",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
            AttributeType::DateTime => "datetime",
            AttributeType::Date => "date",
        };
        f.write_str(name)
    }
}

/// Persistence layer targeted by generated models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    /// SQLAlchemy 2.0 (`Mapped[]` / `mapped_column`)
    #[default]
    Sql,
    /// Beanie documents on MongoDB
    MongoDb,
}

impl FromStr for Persistence {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" => Ok(Persistence::Sql),
            "mongodb" | "mongo" => Ok(Persistence::MongoDb),
            other => Err(DescriptionError::UnsupportedPersistence(other.to_string())),
        }
    }
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persistence::Sql => f.write_str("sql"),
            Persistence::MongoDb => f.write_str("mongodb"),
        }
    }
}

/// Optional features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Features {
    /// Generate user model, auth endpoints and security helpers
    #[serde(default)]
    pub authentication: bool,
    /// Require an authenticated user on the resource's mutating routes
    #[serde(default)]
    pub protect_routes: bool,
}

impl Features {
    /// Authentication enabled, routes public
    #[inline]
    #[must_use]
    pub fn authentication() -> Self {
        Self {
            authentication: true,
            protect_routes: false,
        }
    }

    /// Authentication enabled, routes protected
    #[inline]
    #[must_use]
    pub fn protected() -> Self {
        Self {
            authentication: true,
            protect_routes: true,
        }
    }
}

/// Problems with a resource description
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptionError {
    /// Resource name missing
    #[error("resource name is empty")]
    EmptyResourceName,

    /// No attributes declared
    #[error("resource declares no attributes")]
    NoAttributes,

    /// Name is not a Python identifier
    #[error("invalid {what} name: '{value}'")]
    InvalidIdentifier { what: &'static str, value: String },

    /// Attribute declared twice
    #[error("duplicate attribute: '{0}'")]
    DuplicateAttribute(String),

    /// Type name not supported
    #[error("unsupported type '{type_name}' for attribute '{attribute}'")]
    UnsupportedAttributeType { attribute: String, type_name: String },

    /// Compact notation pair is not `name:type`
    #[error("invalid attribute format: '{0}', expected 'name:type'")]
    MalformedAttribute(String),

    /// Persistence layer not supported
    #[error("unsupported persistence layer: '{0}'")]
    UnsupportedPersistence(String),

    /// Route protection needs authentication
    #[error("protect_routes requires authentication to be enabled")]
    ProtectRoutesWithoutAuthentication,
}
