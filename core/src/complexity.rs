//! Cyclomatic-complexity proxy and the badge tier derived from it.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::config::ComplexityThresholds;

/// Score of a function with no decision points.
pub const BASE_COMPLEXITY: u32 = 1;

/// Count decision points anywhere under `body`, starting from [`BASE_COMPLEXITY`].
///
/// Nested function bodies are walked too, so a closure's branches count toward
/// the enclosing function.
pub fn score_function(body: Node) -> u32 {
    let mut score = BASE_COMPLEXITY;
    let mut cursor = body.walk();
    loop {
        if is_decision_point(&cursor.node()) {
            score += 1;
        }
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return score;
            }
        }
    }
}

/// Whether `node` adds one path through the function.
pub fn is_decision_point(node: &Node) -> bool {
    match node.kind() {
        "if_statement" | "for_statement" | "for_in_statement" | "while_statement"
        | "do_statement" | "switch_case" | "switch_default" | "catch_clause"
        | "ternary_expression" => true,
        "binary_expression" => node
            .child_by_field_name("operator")
            .is_some_and(|op| is_logical_operator(op.kind())),
        _ => false,
    }
}

fn is_logical_operator(op: &str) -> bool {
    matches!(op, "&&" | "||" | "??")
}

/// Three-tier badge shown next to the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

impl ComplexityTier {
    pub fn for_score(score: u32, thresholds: &ComplexityThresholds) -> Self {
        if score < thresholds.medium {
            ComplexityTier::Low
        } else if score < thresholds.high {
            ComplexityTier::Medium
        } else {
            ComplexityTier::High
        }
    }

    /// Badge color name understood by the render host.
    pub fn color(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "green",
            ComplexityTier::Medium => "orange",
            ComplexityTier::High => "red",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "low",
            ComplexityTier::Medium => "medium",
            ComplexityTier::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{locate_function, FIRST_FUNCTION};
    use crate::parser::{parse_source, SourceLanguage};

    fn score(source: &str) -> u32 {
        let tree = parse_source(source, SourceLanguage::JavaScript).unwrap();
        let func = locate_function(tree.root_node(), FIRST_FUNCTION).unwrap();
        let body = func.child_by_field_name("body").unwrap();
        score_function(body)
    }

    #[test]
    fn straight_line_code_scores_one() {
        assert_eq!(score("function f(a, b) { const c = a + b; log(c); return c * 2; }"), 1);
    }

    #[test]
    fn counts_each_statement_kind_once() {
        let src = r#"
function f(xs) {
    if (xs) {}
    for (let i = 0; i < 1; i++) {}
    for (const x of xs) {}
    while (false) {}
    do {} while (false);
    try { g(); } catch (e) {}
    switch (xs.length) {
        case 0: break;
        case 1: break;
        default: break;
    }
}"#;
        // if, for, for-of, while, do, catch, two cases, default
        assert_eq!(score(src), 1 + 9);
    }

    #[test]
    fn counts_logical_and_ternary_expressions() {
        let src = "function f(a, b, c) { return a && b || c ? a ?? b : c; }";
        // &&, ||, ??, ?:
        assert_eq!(score(src), 1 + 4);
    }

    #[test]
    fn ignores_non_logical_binary_operators() {
        assert_eq!(score("function f(a, b) { return (a + b) * (a - b) > 0; }"), 1);
    }

    #[test]
    fn includes_nested_closures() {
        let src = "function outer(xs) { return xs.map((x) => { if (x) { return 1; } return 0; }); }";
        assert_eq!(score(src), 2);
    }

    #[test]
    fn loop_example_scores_two() {
        let src = "function calculateSum(numbers) { let sum = 0; for (let i = 0; i < numbers.length; i++) { sum += numbers[i]; } return sum; }";
        assert_eq!(score(src), 2);
    }

    #[test]
    fn long_logical_chain_does_not_exhaust_the_stack() {
        let terms = vec!["a"; 100_000].join(" && ");
        let src = format!("function f(a) {{ return {terms}; }}");
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || score(&src))
            .unwrap();
        assert_eq!(handle.join().unwrap(), 100_000);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = ComplexityThresholds::default();
        assert_eq!(ComplexityTier::for_score(1, &t), ComplexityTier::Low);
        assert_eq!(ComplexityTier::for_score(4, &t), ComplexityTier::Low);
        assert_eq!(ComplexityTier::for_score(5, &t), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::for_score(9, &t), ComplexityTier::Medium);
        assert_eq!(ComplexityTier::for_score(10, &t), ComplexityTier::High);
        assert_eq!(ComplexityTier::High.color(), "red");
    }
}
