//! Interface conventions for endpoint modules
//!
//! Endpoint artifacts must create an `APIRouter`, register handlers on it,
//! declare a response contract per handler, return 201 from `post` handlers
//! and obtain collaborators through `Depends` imported from fastapi.

use crate::check::{Check, CheckContext};
use crate::source::last_segment;
use kiln_artifact::{ArtifactKind, ArtifactSpec, IssueCategory, ValidationIssue};

/// Checks endpoint shape
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceCheck;

impl Check for InterfaceCheck {
    fn name(&self) -> &'static str {
        "interface"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::InterfaceConvention
    }

    fn applies_to(&self, spec: &ArtifactSpec) -> bool {
        spec.kind == ArtifactKind::Interface
    }

    fn run(&self, ctx: &CheckContext<'_, '_>) -> Vec<ValidationIssue> {
        let source = ctx.source;
        let calls = source.calls();
        let handlers = source.route_handlers();
        let mut issues = Vec::new();

        if !calls.iter().any(|call| call.name() == "APIRouter") {
            issues.push(warn("endpoint module should create an APIRouter", "module:APIRouter"));
        }

        if handlers.is_empty() {
            issues.push(warn(
                "no route handlers registered with @router.<verb>",
                "module:handlers",
            ));
        }

        for handler in &handlers {
            if !handler.has_keyword("response_model") && !handler.has_return_annotation {
                issues.push(warn(
                    format!(
                        "handler `{}` declares neither response_model nor a return type",
                        handler.function
                    ),
                    format!("{}:response", handler.function),
                ));
            }
            if handler.verb == "post" && !handler.has_keyword("status_code") {
                issues.push(warn(
                    format!(
                        "POST handler `{}` should declare status_code=201",
                        handler.function
                    ),
                    format!("{}:status_code", handler.function),
                ));
            }
        }

        let uses_depends = calls.iter().any(|call| call.name() == "Depends");
        if !handlers.is_empty() && !handlers.iter().any(|h| h.injects_dependencies) {
            issues.push(warn(
                "handlers should receive collaborators through Depends(...)",
                "module:injection",
            ));
        }
        if uses_depends {
            let imported = source.imports().iter().any(|import| {
                import.module == "fastapi"
                    && import.names.iter().any(|name| last_segment(name) == "Depends")
            });
            if !imported {
                issues.push(warn(
                    "Depends is used but not imported from fastapi",
                    "module:Depends",
                ));
            }
        }

        issues
    }
}

fn warn(message: impl Into<String>, location: impl Into<String>) -> ValidationIssue {
    ValidationIssue::warning(IssueCategory::InterfaceConvention, message).at(location)
}
