//! Python source model
//!
//! Parses a candidate once with tree-sitter and exposes the syntactic facts
//! the checks look at: syntax errors, imports, classes, calls, annotations
//! and route handlers.

use crate::error::ValidationError;
use tree_sitter::{Node, Parser, Tree};

/// HTTP verbs recognised on router decorators
pub const ROUTE_VERBS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Parsed Python source
pub struct SourceUnit<'src> {
    source: &'src str,
    tree: Tree,
}

impl std::fmt::Debug for SourceUnit<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceUnit")
            .field("bytes", &self.source.len())
            .field("has_error", &self.tree.root_node().has_error())
            .finish()
    }
}

impl<'src> SourceUnit<'src> {
    /// Parse Python source
    ///
    /// tree-sitter recovers from syntax errors, so a candidate with errors
    /// still yields a unit; see [`Self::syntax_errors`].
    ///
    /// # Errors
    /// Returns error if the parser cannot be initialised or gives up
    pub fn parse(source: &'src str) -> Result<Self, ValidationError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ValidationError::ParserInit(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or(ValidationError::ParseFailed)?;

        Ok(Self { source, tree })
    }

    /// Source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Check if the tree contains error or missing nodes
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Every ERROR and MISSING node, outermost only
    #[must_use]
    pub fn syntax_errors(&self) -> Vec<SyntaxError> {
        let mut errors = Vec::new();
        walk(self.tree.root_node(), &mut |node| {
            if node.is_missing() {
                let (line, column) = position(node);
                errors.push(SyntaxError {
                    line,
                    column,
                    message: format!("missing `{}`", node.kind()),
                });
                return false;
            }
            if node.is_error() {
                let (line, column) = position(node);
                errors.push(SyntaxError {
                    line,
                    column,
                    message: format!("invalid syntax near `{}`", snippet(self.text(node))),
                });
                return false;
            }
            true
        });
        errors
    }

    /// Import statements in source order
    #[must_use]
    pub fn imports(&self) -> Vec<Import> {
        let mut imports = Vec::new();
        walk(self.tree.root_node(), &mut |node| match node.kind() {
            "import_statement" => {
                let (line, column) = position(node);
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    imports.push(Import {
                        module: self.imported_name(name).to_string(),
                        names: Vec::new(),
                        relative: false,
                        line,
                        column,
                    });
                }
                false
            }
            "import_from_statement" => {
                let (line, column) = position(node);
                let Some(module) = node.child_by_field_name("module_name") else {
                    return false;
                };
                let mut names = Vec::new();
                let mut cursor = node.walk();
                for name in node.children_by_field_name("name", &mut cursor) {
                    names.push(self.imported_name(name).to_string());
                }
                if names.is_empty() && has_child_kind(node, "wildcard_import") {
                    names.push("*".to_string());
                }
                imports.push(Import {
                    module: self.text(module).to_string(),
                    names,
                    relative: module.kind() == "relative_import",
                    line,
                    column,
                });
                false
            }
            _ => true,
        });
        imports
    }

    /// Class definitions with their base expressions
    #[must_use]
    pub fn classes(&self) -> Vec<ClassDef> {
        let mut classes = Vec::new();
        walk(self.tree.root_node(), &mut |node| {
            if node.kind() == "class_definition" {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let mut bases = Vec::new();
                if let Some(superclasses) = node.child_by_field_name("superclasses") {
                    for i in 0..superclasses.named_child_count() {
                        if let Some(base) = superclasses.named_child(i) {
                            if base.kind() != "keyword_argument" {
                                bases.push(self.text(base).to_string());
                            }
                        }
                    }
                }
                let (line, _) = position(node);
                classes.push(ClassDef { name, bases, line });
            }
            true
        });
        classes
    }

    /// All call expressions
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        let mut calls = Vec::new();
        walk(self.tree.root_node(), &mut |node| {
            if node.kind() == "call" {
                if let Some(function) = node.child_by_field_name("function") {
                    let (line, column) = position(node);
                    calls.push(Call {
                        callee: self.text(function).to_string(),
                        line,
                        column,
                    });
                }
            }
            true
        });
        calls
    }

    /// Text of every type annotation (variables, parameters, return types)
    #[must_use]
    pub fn annotations(&self) -> Vec<&'src str> {
        let mut annotations = Vec::new();
        walk(self.tree.root_node(), &mut |node| {
            if node.kind() == "type" {
                annotations.push(self.text(node));
                return false;
            }
            true
        });
        annotations
    }

    /// Functions decorated with `@<object>.<verb>(...)`
    #[must_use]
    pub fn route_handlers(&self) -> Vec<RouteHandler> {
        let mut handlers = Vec::new();
        walk(self.tree.root_node(), &mut |node| {
            if node.kind() != "decorated_definition" {
                return true;
            }
            let Some(function) = node.child_by_field_name("definition") else {
                return true;
            };
            if function.kind() != "function_definition" {
                return true;
            }
            for i in 0..node.named_child_count() {
                let Some(decorator) = node.named_child(i) else {
                    continue;
                };
                if decorator.kind() != "decorator" {
                    continue;
                }
                if let Some(handler) = self.route_handler(decorator, function) {
                    handlers.push(handler);
                }
            }
            false
        });
        handlers
    }

    fn route_handler(&self, decorator: Node<'_>, function: Node<'_>) -> Option<RouteHandler> {
        let call = decorator.named_child(0).filter(|n| n.kind() == "call")?;
        let target = call
            .child_by_field_name("function")
            .filter(|n| n.kind() == "attribute")?;
        let object = self.text(target.child_by_field_name("object")?).to_string();
        let verb = self.text(target.child_by_field_name("attribute")?).to_string();
        if !ROUTE_VERBS.contains(&verb.as_str()) {
            return None;
        }

        let mut keywords = Vec::new();
        if let Some(arguments) = call.child_by_field_name("arguments") {
            for i in 0..arguments.named_child_count() {
                if let Some(arg) = arguments.named_child(i) {
                    if arg.kind() == "keyword_argument" {
                        if let Some(name) = arg.child_by_field_name("name") {
                            keywords.push(self.text(name).to_string());
                        }
                    }
                }
            }
        }

        let mut injects = false;
        if let Some(parameters) = function.child_by_field_name("parameters") {
            walk(parameters, &mut |node| {
                if node.kind() == "call" {
                    let callee = node
                        .child_by_field_name("function")
                        .map(|f| self.text(f))
                        .unwrap_or_default();
                    if last_segment(callee) == "Depends" {
                        injects = true;
                    }
                }
                !injects
            });
        }

        let (line, column) = position(decorator);
        Some(RouteHandler {
            object,
            verb,
            function: function
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default(),
            keywords,
            has_return_annotation: function.child_by_field_name("return_type").is_some(),
            injects_dependencies: injects,
            line,
            column,
        })
    }

    fn imported_name(&self, node: Node<'_>) -> &'src str {
        if node.kind() == "aliased_import" {
            node.child_by_field_name("name")
                .map_or("", |name| self.text(name))
        } else {
            self.text(node)
        }
    }

    fn text(&self, node: Node<'_>) -> &'src str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

/// Syntax error location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    /// Description
    pub message: String,
}

impl SyntaxError {
    /// `line:column` location hint
    #[inline]
    #[must_use]
    pub fn location(&self) -> String {
        format!("{}:{}", self.line, self.column)
    }
}

/// One imported module
///
/// `import a.b` yields module `a.b` with no names; `from a.b import c, d`
/// yields module `a.b` with names `c`, `d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module text as written (relative imports keep their dots)
    pub module: String,
    /// Imported names for `from` imports
    pub names: Vec<String>,
    /// `from . import x` style
    pub relative: bool,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Base class expressions as written
    pub bases: Vec<String>,
    /// 1-based line
    pub line: usize,
}

impl ClassDef {
    /// Check if any base's last segment equals or ends with `suffix`
    #[must_use]
    pub fn derives_from_suffix(&self, suffix: &str) -> bool {
        self.bases
            .iter()
            .any(|base| last_segment(base).ends_with(suffix))
    }
}

/// Call expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Callee expression as written, e.g. `sa.Column`
    pub callee: String,
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
}

impl Call {
    /// Last segment of the callee, e.g. `Column` for `sa.Column`
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        last_segment(&self.callee)
    }
}

/// Route handler registered through a decorator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHandler {
    /// Decorated object, normally `router`
    pub object: String,
    /// Lowercase HTTP verb
    pub verb: String,
    /// Handler function name
    pub function: String,
    /// Keyword arguments of the decorator call
    pub keywords: Vec<String>,
    /// Function declares `-> T`
    pub has_return_annotation: bool,
    /// A parameter defaults to `Depends(...)`
    pub injects_dependencies: bool,
    /// 1-based line of the decorator
    pub line: usize,
    /// 1-based column of the decorator
    pub column: usize,
}

impl RouteHandler {
    /// Check if the decorator passes keyword `name`
    #[inline]
    #[must_use]
    pub fn has_keyword(&self, name: &str) -> bool {
        self.keywords.iter().any(|k| k == name)
    }
}

/// Last dotted segment of an expression
#[inline]
#[must_use]
pub fn last_segment(expr: &str) -> &str {
    expr.rsplit('.').next().unwrap_or(expr).trim()
}

/// Pre-order traversal of `node`; a visitor returning `false` skips the subtree
///
/// Iterative so that deeply nested sources cannot exhaust the stack.
fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>) -> bool) {
    let mut cursor = node.walk();
    loop {
        if visit(cursor.node()) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.node() == node {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .any(|child| child.kind() == kind)
}

fn position(node: Node<'_>) -> (usize, usize) {
    let point = node.start_position();
    (point.row + 1, point.column + 1)
}

fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > 40 {
        line.chars().take(40).collect::<String>() + "..."
    } else {
        line.to_string()
    }
}
