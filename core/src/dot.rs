//! Graphviz (dot) serialization of a [`ControlFlowGraph`].

use std::fmt::Write;

use crate::cfg::{CfgEdge, CfgNode, ControlFlowGraph, EdgeKind, NodeKind};
use crate::config::LayoutHints;
use crate::error::Result;

/// Shape and colors for one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeStyle {
    pub shape: &'static str,
    pub style: &'static str,
    pub border: &'static str,
    pub font_color: Option<&'static str>,
}

pub fn node_style(kind: NodeKind) -> NodeStyle {
    let plain = |shape: &'static str, style: &'static str, border: &'static str| NodeStyle {
        shape,
        style,
        border,
        font_color: None,
    };
    match kind {
        NodeKind::Entry => plain("ellipse", "filled", "#2E7D32"),
        NodeKind::Decision => plain("diamond", "filled", "#F0AD4E"),
        NodeKind::Loop => plain("hexagon", "filled", "#0288D1"),
        NodeKind::Return => plain("box", "rounded,filled", "#DC3545"),
        NodeKind::Statement => plain("box", "filled", "#6C757D"),
        NodeKind::Io => plain("parallelogram", "filled", "#5E35B1"),
        NodeKind::Merge => plain("point", "filled", "#6C757D"),
        NodeKind::Exit => plain("point", "filled", "#0288D1"),
        NodeKind::Terminal => NodeStyle {
            font_color: Some("#FFFFFF"),
            ..plain("ellipse", "filled", "#343A40")
        },
    }
}

/// Render `cfg` as a dot digraph.
///
/// Nodes come first, then edges, both in creation order. Ids are quoted
/// verbatim so source-backed ids keep their `|start|end` suffix.
pub fn to_dot(cfg: &ControlFlowGraph, layout: &LayoutHints) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "digraph CFG {{")?;
    writeln!(out, "  rankdir={};", layout.rank_dir)?;
    writeln!(out, "  splines={};", layout.splines)?;
    writeln!(
        out,
        "  node [fontname=\"{}\", fontsize=10];",
        escape(&layout.font_name)
    )?;
    writeln!(
        out,
        "  edge [fontname=\"{}\", fontsize=9];",
        escape(&layout.font_name)
    )?;
    for node in &cfg.nodes {
        write_node(&mut out, node)?;
    }
    for edge in &cfg.edges {
        write_edge(&mut out, edge)?;
    }
    writeln!(out, "}}")?;
    Ok(out)
}

fn write_node(out: &mut String, node: &CfgNode) -> std::fmt::Result {
    let style = node_style(node.kind);
    write!(
        out,
        "  \"{}\" [label=\"{}\", shape={}, style=\"{}\", fillcolor=\"{}\", color=\"{}\"",
        node.id,
        escape(&node.label),
        style.shape,
        style.style,
        node.kind.fill_color(),
        style.border
    )?;
    if matches!(node.kind, NodeKind::Merge | NodeKind::Exit) {
        write!(out, ", width=0.15")?;
    }
    if let Some(font_color) = style.font_color {
        write!(out, ", fontcolor=\"{font_color}\"")?;
    }
    writeln!(out, "];")
}

fn write_edge(out: &mut String, edge: &CfgEdge) -> std::fmt::Result {
    let mut attrs = Vec::new();
    if let Some(label) = edge.label {
        attrs.push(format!("label=\"{}\"", label.as_str()));
    }
    if edge.kind == EdgeKind::LoopBack {
        attrs.push("style=dashed".to_string());
        attrs.push("constraint=false".to_string());
    }
    write!(out, "  \"{}\" -> \"{}\"", edge.from, edge.to)?;
    if !attrs.is_empty() {
        write!(out, " [{}]", attrs.join(", "))?;
    }
    writeln!(out, ";")
}

/// Escape text for a double-quoted dot string.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' | '\r' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{EdgeLabel, NodeId};

    fn sample() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new("check");
        let decision = NodeId::Source {
            counter: 1,
            start: 4,
            end: 30,
        };
        let merge = NodeId::Synthetic { counter: 2 };
        cfg.add_node(NodeId::Start, NodeKind::Entry, "check");
        cfg.add_node(decision, NodeKind::Decision, "s == \"x\" ?");
        cfg.add_node(merge, NodeKind::Merge, "");
        cfg.add_node(NodeId::End, NodeKind::Terminal, "End");
        cfg.add_edge(NodeId::Start, decision, EdgeKind::Fallthrough, None);
        cfg.add_edge(decision, merge, EdgeKind::Fallthrough, Some(EdgeLabel::No));
        cfg.add_edge(merge, decision, EdgeKind::LoopBack, None);
        cfg.add_edge(merge, NodeId::End, EdgeKind::Fallthrough, None);
        cfg
    }

    #[test]
    fn writes_header_nodes_and_edges_in_order() {
        let dot = to_dot(&sample(), &LayoutHints::default()).unwrap();
        let lines: Vec<&str> = dot.lines().collect();
        assert_eq!(lines[0], "digraph CFG {");
        assert_eq!(lines[1], "  rankdir=TB;");
        assert_eq!(lines[2], "  splines=polyline;");
        assert!(lines[5].starts_with("  \"start\" [label=\"check\", shape=ellipse"));
        assert!(lines[6].starts_with("  \"1|4|30\" [label=\"s == \\\"x\\\" ?\", shape=diamond"));
        assert!(lines[7].starts_with("  \"2\" [label=\"\", shape=point"));
        assert!(lines[8].contains("fontcolor=\"#FFFFFF\""));
        assert_eq!(lines[9], "  \"start\" -> \"1|4|30\";");
        assert_eq!(lines[10], "  \"1|4|30\" -> \"2\" [label=\"No\"];");
        assert_eq!(lines[11], "  \"2\" -> \"1|4|30\" [style=dashed, constraint=false];");
        assert_eq!(lines[12], "  \"2\" -> \"end\";");
        assert_eq!(lines.last(), Some(&"}"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let cfg = sample();
        let layout = LayoutHints::default();
        assert_eq!(to_dot(&cfg, &layout).unwrap(), to_dot(&cfg, &layout).unwrap());
    }

    #[test]
    fn escapes_backslashes_quotes_and_newlines() {
        assert_eq!(escape(r#"a\b"c"#), r#"a\\b\"c"#);
        assert_eq!(escape("x\ny"), "x y");
    }

    #[test]
    fn honors_layout_hints() {
        let layout = LayoutHints {
            rank_dir: "LR".into(),
            splines: "ortho".into(),
            font_name: "Fira Code".into(),
        };
        let dot = to_dot(&sample(), &layout).unwrap();
        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("splines=ortho;"));
        assert!(dot.contains("fontname=\"Fira Code\""));
    }
}
