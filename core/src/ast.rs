//! Statement tree consumed by the CFG builder.
//!
//! The tree-sitter syntax tree is lowered once into a closed set of statement
//! shapes. Only the child slots the builder walks are kept (test, consequent,
//! alternate, body); every other statement becomes [`Stmt::Other`] with its
//! source text.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::locator::{function_name, FunctionKind};
use crate::parser::node_text;

/// Statements nested deeper than this are kept whole as [`Stmt::Other`].
pub const MAX_STATEMENT_DEPTH: usize = 256;

/// Half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn of(node: &Node) -> Self {
        Self::new(node.start_byte(), node.end_byte())
    }
}

/// Loop flavour. All of them lower to the same header/body/exit shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopKind {
    For,
    ForIn,
    While,
    DoWhile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    If {
        span: Span,
        /// Source text of the condition, without the surrounding parentheses.
        test: String,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    Loop {
        span: Span,
        kind: LoopKind,
        body: Box<Stmt>,
    },
    Return {
        span: Span,
    },
    Block {
        span: Span,
        body: Vec<Stmt>,
    },
    Other {
        span: Span,
        text: String,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::If { span, .. }
            | Stmt::Loop { span, .. }
            | Stmt::Return { span }
            | Stmt::Block { span, .. }
            | Stmt::Other { span, .. } => *span,
        }
    }

    /// Lower a tree-sitter statement node.
    pub fn from_node(node: Node, source: &str) -> Stmt {
        Stmt::lower(node, source, 0)
    }

    fn lower(node: Node, source: &str, depth: usize) -> Stmt {
        let span = Span::of(&node);
        if depth >= MAX_STATEMENT_DEPTH {
            return Stmt::Other {
                span,
                text: node_text(node, source).to_string(),
            };
        }
        let depth = depth + 1;
        match node.kind() {
            "statement_block" => Stmt::Block {
                span,
                body: lower_children(node, source, depth),
            },
            "if_statement" => {
                let test = node
                    .child_by_field_name("condition")
                    .map(|c| condition_text(c, source))
                    .unwrap_or_default();
                let consequent = match node.child_by_field_name("consequence") {
                    Some(c) => Stmt::lower(c, source, depth),
                    None => Stmt::empty_block(span),
                };
                let alternate = node
                    .child_by_field_name("alternative")
                    .map(|alt| Box::new(lower_else_clause(alt, source, depth)));
                Stmt::If {
                    span,
                    test,
                    consequent: Box::new(consequent),
                    alternate,
                }
            }
            "for_statement" => Stmt::lower_loop(node, LoopKind::For, source, depth),
            "for_in_statement" => Stmt::lower_loop(node, LoopKind::ForIn, source, depth),
            "while_statement" => Stmt::lower_loop(node, LoopKind::While, source, depth),
            "do_statement" => Stmt::lower_loop(node, LoopKind::DoWhile, source, depth),
            "return_statement" => Stmt::Return { span },
            _ => Stmt::Other {
                span,
                text: node_text(node, source).to_string(),
            },
        }
    }

    fn lower_loop(node: Node, kind: LoopKind, source: &str, depth: usize) -> Stmt {
        let span = Span::of(&node);
        let body = match node.child_by_field_name("body") {
            Some(b) => Stmt::lower(b, source, depth),
            None => Stmt::empty_block(span),
        };
        Stmt::Loop {
            span,
            kind,
            body: Box::new(body),
        }
    }

    fn empty_block(span: Span) -> Stmt {
        Stmt::Block {
            span,
            body: Vec::new(),
        }
    }
}

/// Named, non-comment children of a block-like node, lowered in order.
pub fn lower_statements(node: Node, source: &str) -> Vec<Stmt> {
    lower_children(node, source, 0)
}

fn lower_children(node: Node, source: &str, depth: usize) -> Vec<Stmt> {
    let mut cursor = node.walk();
    let stmts = node
        .named_children(&mut cursor)
        .filter(|child| !is_comment(child))
        .map(|child| Stmt::lower(child, source, depth))
        .collect();
    stmts
}

fn lower_else_clause(node: Node, source: &str, depth: usize) -> Stmt {
    if node.kind() != "else_clause" {
        return Stmt::lower(node, source, depth);
    }
    let mut cursor = node.walk();
    let inner = node
        .named_children(&mut cursor)
        .find(|child| !is_comment(child));
    match inner {
        Some(stmt) => Stmt::lower(stmt, source, depth),
        None => Stmt::empty_block(Span::of(&node)),
    }
}

fn condition_text(node: Node, source: &str) -> String {
    if node.kind() == "parenthesized_expression" {
        let mut cursor = node.walk();
        let inner = node
            .named_children(&mut cursor)
            .find(|child| !is_comment(child));
        if let Some(inner) = inner {
            return node_text(inner, source).to_string();
        }
    }
    node_text(node, source).to_string()
}

fn is_comment(node: &Node) -> bool {
    node.kind().contains("comment")
}

/// Body of a located function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBody {
    /// Block body: the statements inside the braces.
    Block(Vec<Stmt>),
    /// Arrow function with an expression body, drawn as one statement.
    Expression(Stmt),
}

impl FunctionBody {
    pub fn statements(&self) -> &[Stmt] {
        match self {
            FunctionBody::Block(stmts) => stmts,
            FunctionBody::Expression(stmt) => std::slice::from_ref(stmt),
        }
    }
}

/// The function a visualization request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTarget {
    pub name: String,
    pub kind: FunctionKind,
    pub span: Span,
    pub body: Option<FunctionBody>,
}

impl FunctionTarget {
    /// Lower a function-defining node. Returns `None` for non-function nodes.
    pub fn from_node(node: Node, source: &str) -> Option<Self> {
        let kind = FunctionKind::from_node_kind(node.kind())?;
        let body = node.child_by_field_name("body").map(|body| {
            if body.kind() == "statement_block" {
                FunctionBody::Block(lower_statements(body, source))
            } else {
                FunctionBody::Expression(Stmt::Other {
                    span: Span::of(&body),
                    text: node_text(body, source).to_string(),
                })
            }
        });
        Some(Self {
            name: function_name(&node, source),
            kind,
            span: Span::of(&node),
            body,
        })
    }

    pub fn statements(&self) -> &[Stmt] {
        self.body.as_ref().map(FunctionBody::statements).unwrap_or(&[])
    }
}
