//! Structural syntax validity

use crate::check::{Check, CheckContext};
use kiln_artifact::{IssueCategory, ValidationIssue};

/// Reports every syntax error tree-sitter recovers from
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxCheck;

impl Check for SyntaxCheck {
    fn name(&self) -> &'static str {
        "syntax"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Syntax
    }

    fn run(&self, ctx: &CheckContext<'_, '_>) -> Vec<ValidationIssue> {
        ctx.source
            .syntax_errors()
            .into_iter()
            .map(|error| {
                ValidationIssue::critical(IssueCategory::Syntax, error.message.clone())
                    .at(error.location())
            })
            .collect()
    }
}
