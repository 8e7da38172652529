//! tree-sitter front end for JavaScript and TypeScript sources.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

use crate::error::{CodeVizError, Result};

/// Grammar used to parse a source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceLanguage {
    #[default]
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceLanguage {
    /// Guess the grammar from a file extension. Unknown extensions yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|s| s.to_str())?;
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => Some(SourceLanguage::JavaScript),
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "js" | "javascript" | "jsx" => Some(SourceLanguage::JavaScript),
            "ts" | "typescript" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::TypeScript => "typescript",
            SourceLanguage::Tsx => "tsx",
        }
    }
}

/// Parse `source` into a syntax tree, rejecting trees that contain syntax errors.
pub fn parse_source(source: &str, language: SourceLanguage) -> Result<Tree> {
    let mut parser = Parser::new();
    let lang = match language {
        SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE,
        SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
        SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX,
    };
    parser.set_language(&lang.into()).map_err(|e| {
        CodeVizError::parse(format!("failed to load {} grammar: {e}", language.as_str()))
    })?;

    let Some(tree) = parser.parse(source, None) else {
        return Err(CodeVizError::parse("parser returned no tree"));
    };

    let root = tree.root_node();
    if root.has_error() {
        let message = match first_error(root) {
            Some(node) => {
                let pos = node.start_position();
                let what = if node.is_missing() {
                    format!("missing `{}`", node.kind())
                } else {
                    "unexpected token".to_string()
                };
                format!("{what} at line {}, column {}", pos.row + 1, pos.column + 1)
            }
            None => "source contains syntax errors".to_string(),
        };
        return Err(CodeVizError::parse(message));
    }

    Ok(tree)
}

fn first_error(root: Node) -> Option<Node> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// Source text covered by `node`, or an empty string for invalid UTF-8 slices.
pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_javascript() {
        let tree = parse_source("function f(a) { return a; }", SourceLanguage::JavaScript).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn parses_typescript_annotations() {
        let src = "function f(a: number): number { return a; }";
        assert!(parse_source(src, SourceLanguage::TypeScript).is_ok());
    }

    #[test]
    fn reports_syntax_errors_with_position() {
        let err = parse_source("function f( { return 1; ", SourceLanguage::JavaScript).unwrap_err();
        match err {
            CodeVizError::Parse { message } => assert!(message.contains("line 1"), "{message}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn detects_language_from_extension() {
        assert_eq!(
            SourceLanguage::from_path(Path::new("src/app.mjs")),
            Some(SourceLanguage::JavaScript)
        );
        assert_eq!(
            SourceLanguage::from_path(Path::new("view.TSX")),
            Some(SourceLanguage::Tsx)
        );
        assert_eq!(SourceLanguage::from_path(Path::new("notes.md")), None);
    }
}
