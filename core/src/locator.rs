//! Finds the function under the cursor.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, TreeCursor};

use crate::error::{CodeVizError, Result};
use crate::parser::node_text;

/// Offset value meaning "no cursor": pick the first function in the file.
pub const FIRST_FUNCTION: usize = 0;

/// Display name used for arrow functions, which never carry an identifier.
pub const ARROW_FUNCTION_NAME: &str = "Arrow Fn";
/// Display name used for any other unnamed function.
pub const ANONYMOUS_FUNCTION_NAME: &str = "anonymous";

/// Syntactic flavour of a function-defining node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionKind {
    Declaration,
    Expression,
    Arrow,
    Generator,
}

impl FunctionKind {
    pub fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "function_declaration" => Some(FunctionKind::Declaration),
            // older grammars call function expressions plain `function`
            "function_expression" | "function" => Some(FunctionKind::Expression),
            "arrow_function" => Some(FunctionKind::Arrow),
            "generator_function_declaration" | "generator_function" => {
                Some(FunctionKind::Generator)
            }
            _ => None,
        }
    }
}

pub fn is_function_node(node: &Node) -> bool {
    node.is_named() && FunctionKind::from_node_kind(node.kind()).is_some()
}

/// Locate the function node for `offset`.
///
/// With [`FIRST_FUNCTION`] the first function in pre-order wins, so the
/// outermost function of the file is returned. Any other offset selects the
/// innermost function whose `[start, end]` byte range contains it.
pub fn locate_function<'tree>(root: Node<'tree>, offset: usize) -> Result<Node<'tree>> {
    let found = if offset == FIRST_FUNCTION {
        first_function(root)
    } else {
        innermost_enclosing(root, offset)
    };
    match found {
        Some(node) => {
            tracing::debug!(
                kind = node.kind(),
                start = node.start_byte(),
                end = node.end_byte(),
                offset,
                "located function"
            );
            Ok(node)
        }
        None => Err(CodeVizError::NoFunctionFound),
    }
}

fn first_function(root: Node) -> Option<Node> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if is_function_node(&node) {
            return Some(node);
        }
        if cursor.goto_first_child() {
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

/// Post-order walk over the nodes whose range contains `offset`. The first
/// function finished is the innermost one.
fn innermost_enclosing(root: Node, offset: usize) -> Option<Node> {
    if !contains(&root, offset) {
        return None;
    }
    let mut cursor = root.walk();
    loop {
        if descend_into_containing_child(&mut cursor, offset) {
            continue;
        }
        loop {
            let node = cursor.node();
            if is_function_node(&node) {
                return Some(node);
            }
            if advance_to_containing_sibling(&mut cursor, offset) {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn contains(node: &Node, offset: usize) -> bool {
    node.start_byte() <= offset && offset <= node.end_byte()
}

fn descend_into_containing_child(cursor: &mut TreeCursor, offset: usize) -> bool {
    if !cursor.goto_first_child() {
        return false;
    }
    if contains(&cursor.node(), offset) || advance_to_containing_sibling(cursor, offset) {
        return true;
    }
    cursor.goto_parent();
    false
}

fn advance_to_containing_sibling(cursor: &mut TreeCursor, offset: usize) -> bool {
    while cursor.goto_next_sibling() {
        if contains(&cursor.node(), offset) {
            return true;
        }
    }
    false
}

/// Human-readable name of a function node.
pub fn function_name(node: &Node, source: &str) -> String {
    if let Some(name_node) = node.child_by_field_name("name") {
        let name = node_text(name_node, source);
        if !name.is_empty() {
            return name.to_string();
        }
    }
    match FunctionKind::from_node_kind(node.kind()) {
        Some(FunctionKind::Arrow) => ARROW_FUNCTION_NAME.to_string(),
        _ => ANONYMOUS_FUNCTION_NAME.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_source, SourceLanguage};

    const NESTED: &str = "function outer(a) {\n  const inner = function (b) {\n    return b;\n  };\n  return inner(a);\n}\n";

    fn locate_name(source: &str, offset: usize) -> Result<String> {
        let tree = parse_source(source, SourceLanguage::JavaScript)?;
        let node = locate_function(tree.root_node(), offset)?;
        Ok(function_name(&node, source))
    }

    #[test]
    fn offset_zero_picks_first_function() {
        assert_eq!(locate_name(NESTED, FIRST_FUNCTION).unwrap(), "outer");
    }

    #[test]
    fn cursor_in_nested_function_picks_innermost() {
        let offset = NESTED.find("return b").unwrap();
        assert_eq!(locate_name(NESTED, offset).unwrap(), ANONYMOUS_FUNCTION_NAME);
    }

    #[test]
    fn cursor_in_outer_body_picks_outer() {
        let offset = NESTED.find("return inner").unwrap();
        assert_eq!(locate_name(NESTED, offset).unwrap(), "outer");
    }

    #[test]
    fn range_is_inclusive_at_both_ends() {
        let src = "let x = 1;\nfunction f() { return 1; }\n";
        let start = src.find("function").unwrap();
        let end = src.rfind('}').unwrap() + 1;
        assert_eq!(locate_name(src, start).unwrap(), "f");
        assert_eq!(locate_name(src, end).unwrap(), "f");
    }

    #[test]
    fn arrow_functions_get_their_own_placeholder() {
        let src = "const f = () => { return 1; };";
        let name = locate_name(src, FIRST_FUNCTION).unwrap();
        assert_eq!(name, ARROW_FUNCTION_NAME);
        assert_ne!(name, ANONYMOUS_FUNCTION_NAME);
    }

    #[test]
    fn missing_function_is_an_error() {
        let err = locate_name("let x = 1;\nx += 2;\n", 3).unwrap_err();
        assert!(matches!(err, CodeVizError::NoFunctionFound));
        let err = locate_name("let x = 1;\n", FIRST_FUNCTION).unwrap_err();
        assert!(matches!(err, CodeVizError::NoFunctionFound));
    }

    #[test]
    fn deeply_nested_source_is_located_without_recursion() {
        let depth = 50_000;
        let src = format!(
            "function f(a) {{ return {}a{}; }}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let offset = src.rfind('a').unwrap();
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let innermost = locate_name(&src, offset).unwrap();
                let first = locate_name(&src, FIRST_FUNCTION).unwrap();
                (innermost, first)
            })
            .unwrap();
        let (innermost, first) = handle.join().unwrap();
        assert_eq!(innermost, "f");
        assert_eq!(first, "f");
    }

    #[test]
    fn offset_zero_is_deterministic() {
        let tree = parse_source(NESTED, SourceLanguage::JavaScript).unwrap();
        let a = locate_function(tree.root_node(), FIRST_FUNCTION).unwrap();
        let b = locate_function(tree.root_node(), FIRST_FUNCTION).unwrap();
        assert_eq!(a.id(), b.id());
    }
}
