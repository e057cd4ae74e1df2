//! Data-model conventions
//!
//! SQL models must use SQLAlchemy 2.0 typing (`Mapped[...]` with
//! `mapped_column`). MongoDB models must be Beanie documents.

use crate::check::{Check, CheckContext};
use crate::source::{Call, ClassDef};
use kiln_artifact::{ArtifactKind, ArtifactSpec, IssueCategory, Persistence, ValidationIssue};
use std::collections::HashSet;

/// Checks model typing idiom for the configured persistence layer
#[derive(Debug, Clone, Copy, Default)]
pub struct DataModelCheck;

impl Check for DataModelCheck {
    fn name(&self) -> &'static str {
        "data-model"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::DataModelConvention
    }

    fn applies_to(&self, spec: &ArtifactSpec) -> bool {
        spec.kind == ArtifactKind::Model
            || spec.module.segments().iter().any(|segment| segment == "models")
    }

    fn run(&self, ctx: &CheckContext<'_, '_>) -> Vec<ValidationIssue> {
        let classes = ctx.source.classes();
        let calls = ctx.source.calls();
        match ctx.spec.context.persistence {
            Persistence::Sql => sql_issues(&classes, &calls, &ctx.source.annotations()),
            Persistence::MongoDb => document_issues(&classes, &calls),
        }
    }
}

fn sql_issues(classes: &[ClassDef], calls: &[Call], annotations: &[&str]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if classes.is_empty() {
        issues.push(warn("model module defines no class", "module:class"));
    }

    let mapped = annotations.iter().any(|a| a.contains("Mapped["));
    if !mapped {
        if let Some(column) = calls.iter().find(|call| call.name() == "Column") {
            issues.push(warn(
                "use SQLAlchemy 2.0 Mapped[] annotations instead of Column()",
                format!("{}:{}", column.line, column.column),
            ));
        }
    } else if !calls.iter().any(|call| call.name() == "mapped_column") {
        issues.push(warn(
            "Mapped[] attributes should be declared with mapped_column()",
            "module:mapped_column",
        ));
    }
    issues
}

fn document_issues(classes: &[ClassDef], calls: &[Call]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut documents: HashSet<&str> = HashSet::new();
    for class in classes {
        let local_base = class
            .bases
            .iter()
            .any(|base| documents.contains(crate::source::last_segment(base)));
        if local_base || class.derives_from_suffix("Document") {
            documents.insert(class.name.as_str());
        }
    }
    if documents.is_empty() {
        issues.push(warn(
            "model module defines no Beanie Document class",
            "module:document",
        ));
    }

    if let Some(column) = calls.iter().find(|call| call.name() == "Column") {
        issues.push(warn(
            "Column() is a SQLAlchemy construct; declare document fields with annotations",
            format!("{}:{}", column.line, column.column),
        ));
    }
    issues
}

fn warn(message: impl Into<String>, location: impl Into<String>) -> ValidationIssue {
    ValidationIssue::warning(IssueCategory::DataModelConvention, message).at(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleIndex;
    use crate::source::SourceUnit;
    use crate::test_support::{spec, spec_with};
    use kiln_artifact::Severity;

    fn run(persistence: Persistence, content: &str) -> Vec<ValidationIssue> {
        let spec = spec_with(
            "model",
            ArtifactKind::Model,
            "app/models/widget.py",
            &["base-model"],
            persistence,
        );
        let modules = ModuleIndex::new("app");
        let source = SourceUnit::parse(content).unwrap();
        DataModelCheck.run(&CheckContext {
            spec: &spec,
            source: &source,
            modules: &modules,
        })
    }

    #[test]
    fn applies_to_models_package() {
        let base = spec("base-model", ArtifactKind::Foundation, "app/models/base_model.py", &[]);
        let config = spec("config", ArtifactKind::Foundation, "app/core/config.py", &[]);
        assert!(DataModelCheck.applies_to(&base));
        assert!(!DataModelCheck.applies_to(&config));
    }

    #[test]
    fn modern_sql_model_passes() {
        let content = "\
from sqlalchemy import String
from sqlalchemy.orm import Mapped, mapped_column
from app.models.base_model import Base

class Widget(Base):
    __tablename__ = \"widgets\"
    id: Mapped[int] = mapped_column(primary_key=True)
    name: Mapped[str] = mapped_column(String(255))
";
        assert!(run(Persistence::Sql, content).is_empty());
    }

    #[test]
    fn legacy_column_style_warns() {
        let content = "\
from sqlalchemy import Column, Integer
from app.models.base_model import Base

class Widget(Base):
    __tablename__ = \"widgets\"
    id = Column(Integer, primary_key=True)
";
        let issues = run(Persistence::Sql, content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[0].location.as_deref(), Some("6:10"));
    }

    #[test]
    fn mapped_without_mapped_column_warns() {
        let content = "\
class Widget(Base):
    name: Mapped[str]
";
        let issues = run(Persistence::Sql, content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.as_deref(), Some("module:mapped_column"));
    }

    #[test]
    fn missing_class_warns() {
        let issues = run(Persistence::Sql, "WIDGETS = []\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.as_deref(), Some("module:class"));
    }

    #[test]
    fn beanie_documents() {
        let content = "\
from beanie import Document

class BaseDocument(Document):
    pass

class Widget(BaseDocument):
    name: str
";
        assert!(run(Persistence::MongoDb, content).is_empty());

        let issues = run(Persistence::MongoDb, "class Widget:\n    name: str\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].location.as_deref(), Some("module:document"));
    }
}
