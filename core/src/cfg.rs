//! Control Flow Graph (CFG) construction.
//!
//! A function body is lowered in one recursive pass. The only state threaded
//! through the pass is a [`Cursor`]: the node the next emitted node is wired
//! from, plus a one-shot edge label that the next emitted edge consumes.
//! Node ids come from a counter owned by the builder, so every build is
//! independent of every other.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use unicode_segmentation::UnicodeSegmentation;

use crate::ast::{FunctionTarget, Span, Stmt};
use crate::config::CodeVizConfig;
use crate::error::{CodeVizError, Result};

/// Identity of a CFG node.
///
/// Source-backed ids render as `<counter>|<start>|<end>` so a render host can
/// split a clicked id on `|` and recover the byte range. Synthetic ids render
/// as the bare counter and the sentinels as `start` / `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Start,
    End,
    Source { counter: u32, start: usize, end: usize },
    Synthetic { counter: u32 },
}

impl NodeId {
    /// Byte range of the construct this node was built from.
    pub fn source_span(&self) -> Option<Span> {
        match self {
            NodeId::Source { start, end, .. } => Some(Span::new(*start, *end)),
            _ => None,
        }
    }

    pub fn is_click_target(&self) -> bool {
        matches!(self, NodeId::Source { .. })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Start => f.write_str("start"),
            NodeId::End => f.write_str("end"),
            NodeId::Source {
                counter,
                start,
                end,
            } => write!(f, "{counter}|{start}|{end}"),
            NodeId::Synthetic { counter } => write!(f, "{counter}"),
        }
    }
}

impl FromStr for NodeId {
    type Err = CodeVizError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CodeVizError::parse(format!("invalid node id `{s}`"));
        match s {
            "start" => return Ok(NodeId::Start),
            "end" => return Ok(NodeId::End),
            _ => {}
        }
        let mut parts = s.split('|');
        let counter = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => Ok(NodeId::Synthetic { counter }),
            (Some(start), Some(end), None) => {
                let start = start.parse().map_err(|_| invalid())?;
                let end = end.parse().map_err(|_| invalid())?;
                Ok(NodeId::Source {
                    counter,
                    start,
                    end,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Style class of a CFG node. Used for rendering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Function entry (`start`)
    Entry,
    /// Branch test of an `if`
    Decision,
    /// Loop header
    Loop,
    /// Return statement
    Return,
    /// Plain statement
    Statement,
    /// Statement that performs console / log output
    Io,
    /// Join point after a branch
    Merge,
    /// Join point after a loop
    Exit,
    /// Function end (`end`)
    Terminal,
}

impl NodeKind {
    /// Fill color hint for the node.
    pub fn fill_color(&self) -> &'static str {
        match self {
            NodeKind::Entry => "#C8E6C9",
            NodeKind::Decision => "#FFF3CD",
            NodeKind::Loop => "#E1F5FE",
            NodeKind::Return => "#F8D7DA",
            NodeKind::Statement => "#FFFFFF",
            NodeKind::Io => "#EDE7F6",
            NodeKind::Merge => "#6C757D",
            NodeKind::Exit => "#0288D1",
            NodeKind::Terminal => "#343A40",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Entry => "entry",
            NodeKind::Decision => "decision",
            NodeKind::Loop => "loop",
            NodeKind::Return => "return",
            NodeKind::Statement => "statement",
            NodeKind::Io => "io",
            NodeKind::Merge => "merge",
            NodeKind::Exit => "exit",
            NodeKind::Terminal => "terminal",
        }
    }
}

/// A node in the control flow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
}

/// Kind of CFG edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Forward control flow
    Fallthrough,
    /// Loop body back to its header; drawn dashed and non-constraining
    LoopBack,
}

/// Label disambiguating branch and loop edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeLabel {
    Yes,
    No,
    Do,
    Exit,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Yes => "Yes",
            EdgeLabel::No => "No",
            EdgeLabel::Do => "Do",
            EdgeLabel::Exit => "Exit",
        }
    }
}

/// An edge in the control flow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub label: Option<EdgeLabel>,
}

/// Control flow graph for a single function.
///
/// Nodes and edges are kept in creation order; serializers rely on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    /// Function name, also the label of the entry node
    pub name: String,
    pub nodes: Vec<CfgNode>,
    pub edges: Vec<CfgEdge>,
}

impl ControlFlowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, id: NodeId, kind: NodeKind, label: impl Into<String>) -> NodeId {
        self.nodes.push(CfgNode {
            id,
            kind,
            label: label.into(),
        });
        id
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind, label: Option<EdgeLabel>) {
        self.edges.push(CfgEdge {
            from,
            to,
            kind,
            label,
        });
    }

    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get successors of a node
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| e.to)
            .collect()
    }

    /// Get predecessors of a node
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .map(|e| e.from)
            .collect()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.edges.iter().filter(|e| e.from == id).count()
    }

    /// Nodes that can only be reached by passing through a `Return` node.
    ///
    /// Statements after a return are still drawn chained from it; this walk
    /// treats return nodes as terminal to find them. `end` is never reported.
    pub fn nodes_after_return(&self) -> Vec<&CfgNode> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(NodeId::Start);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let is_return = self
                .node(id)
                .is_some_and(|n| n.kind == NodeKind::Return);
            if is_return {
                continue;
            }
            for next in self.successors(id) {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }

        self.nodes
            .iter()
            .filter(|n| n.id != NodeId::End && !visited.contains(&n.id))
            .collect()
    }

    pub fn stats(&self) -> CfgStats {
        let count = |kind: NodeKind| self.nodes.iter().filter(|n| n.kind == kind).count();
        CfgStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            returns: count(NodeKind::Return),
            decisions: count(NodeKind::Decision),
            loops: count(NodeKind::Loop),
            nodes_after_return: self.nodes_after_return().len(),
        }
    }

    /// Export CFG as Mermaid diagram
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec![String::from("flowchart TD")];
        let index = |id: NodeId| self.nodes.iter().position(|n| n.id == id).unwrap_or(0);

        for (i, node) in self.nodes.iter().enumerate() {
            let label = escape_mermaid(&node.label);
            let shape = match node.kind {
                NodeKind::Decision => format!("    N{i}{{\"{label}\"}}"),
                NodeKind::Loop => format!("    N{i}{{{{\"{label}\"}}}}"),
                NodeKind::Return => format!("    N{i}([\"{label}\"])"),
                NodeKind::Io => format!("    N{i}[/\"{label}\"/]"),
                NodeKind::Merge | NodeKind::Exit => format!("    N{i}(( ))"),
                NodeKind::Entry | NodeKind::Terminal => format!("    N{i}((\"{label}\"))"),
                NodeKind::Statement => format!("    N{i}[\"{label}\"]"),
            };
            lines.push(shape);
        }

        for edge in &self.edges {
            let arrow = match (edge.kind, edge.label) {
                (EdgeKind::LoopBack, Some(l)) => format!(" -.->|{}| ", l.as_str()),
                (EdgeKind::LoopBack, None) => " -.-> ".to_string(),
                (EdgeKind::Fallthrough, Some(l)) => format!(" -->|{}| ", l.as_str()),
                (EdgeKind::Fallthrough, None) => " --> ".to_string(),
            };
            lines.push(format!("    N{}{}N{}", index(edge.from), arrow, index(edge.to)));
        }

        lines.join("\n")
    }
}

/// Entity-escape `#` before `"` so literal entity text survives.
fn escape_mermaid(label: &str) -> String {
    label.replace('#', "#35;").replace('"', "#quot;")
}

/// Statistics about a CFG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgStats {
    pub nodes: usize,
    pub edges: usize,
    pub returns: usize,
    pub decisions: usize,
    pub loops: usize,
    pub nodes_after_return: usize,
}

/// How statement nodes are labeled and classified.
#[derive(Debug, Clone)]
pub struct LabelRules {
    pub snippet_width: usize,
    pub io_patterns: Vec<Regex>,
}

impl LabelRules {
    pub fn from_config(config: &CodeVizConfig) -> Result<Self> {
        let io_patterns = config
            .io_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| CodeVizError::config(format!("invalid io pattern `{p}`: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            snippet_width: config.snippet_width,
            io_patterns,
        })
    }

    /// First line of `text`, cut to `snippet_width` characters.
    pub fn snippet(&self, text: &str) -> String {
        let first = text.lines().next().unwrap_or("").trim_end();
        first.graphemes(true).take(self.snippet_width).collect()
    }

    pub fn is_io(&self, text: &str) -> bool {
        self.io_patterns.iter().any(|re| re.is_match(text))
    }
}

/// Build the CFG for a located function.
pub fn build_cfg(target: &FunctionTarget, rules: &LabelRules) -> ControlFlowGraph {
    let mut builder = CfgBuilder::new(&target.name, rules);
    let cursor = builder.lower_block(target.statements(), Cursor::at(NodeId::Start));
    let cfg = builder.finish(cursor);
    tracing::debug!(
        function = %cfg.name,
        nodes = cfg.nodes.len(),
        edges = cfg.edges.len(),
        "built control flow graph"
    );
    cfg
}

/// Current position of the lowering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    tail: NodeId,
    pending: Option<EdgeLabel>,
}

impl Cursor {
    fn at(tail: NodeId) -> Self {
        Self {
            tail,
            pending: None,
        }
    }

    fn labeled(tail: NodeId, label: EdgeLabel) -> Self {
        Self {
            tail,
            pending: Some(label),
        }
    }
}

struct CfgBuilder<'a> {
    cfg: ControlFlowGraph,
    rules: &'a LabelRules,
    counter: u32,
}

impl<'a> CfgBuilder<'a> {
    fn new(name: &str, rules: &'a LabelRules) -> Self {
        let mut cfg = ControlFlowGraph::new(name);
        cfg.add_node(NodeId::Start, NodeKind::Entry, name);
        Self {
            cfg,
            rules,
            counter: 0,
        }
    }

    fn finish(mut self, cursor: Cursor) -> ControlFlowGraph {
        self.cfg.add_node(NodeId::End, NodeKind::Terminal, "End");
        let tail_returns = self
            .cfg
            .node(cursor.tail)
            .is_some_and(|n| n.kind == NodeKind::Return);
        if !tail_returns {
            self.connect(cursor, NodeId::End);
        }
        self.cfg
    }

    fn lower_block(&mut self, stmts: &[Stmt], mut cursor: Cursor) -> Cursor {
        for stmt in stmts {
            cursor = self.lower_stmt(stmt, cursor);
        }
        cursor
    }

    fn lower_stmt(&mut self, stmt: &Stmt, cursor: Cursor) -> Cursor {
        match stmt {
            Stmt::Block { body, .. } => self.lower_block(body, cursor),
            Stmt::If {
                span,
                test,
                consequent,
                alternate,
            } => self.lower_if(*span, test, consequent, alternate.as_deref(), cursor),
            Stmt::Loop { span, body, .. } => self.lower_loop(*span, body, cursor),
            Stmt::Return { span } => {
                let node = self.source_node(*span, NodeKind::Return, "Return");
                self.connect(cursor, node)
            }
            Stmt::Other { span, text } => {
                let kind = if self.rules.is_io(text) {
                    NodeKind::Io
                } else {
                    NodeKind::Statement
                };
                let label = self.rules.snippet(text);
                let node = self.source_node(*span, kind, label);
                self.connect(cursor, node)
            }
        }
    }

    fn lower_if(
        &mut self,
        span: Span,
        test: &str,
        consequent: &Stmt,
        alternate: Option<&Stmt>,
        cursor: Cursor,
    ) -> Cursor {
        let label = format!("{} ?", self.rules.snippet(test));
        let decision = self.source_node(span, NodeKind::Decision, label);
        self.connect(cursor, decision);

        let then_cursor = self.lower_stmt(consequent, Cursor::labeled(decision, EdgeLabel::Yes));
        let else_start = Cursor::labeled(decision, EdgeLabel::No);
        let else_cursor = match alternate {
            Some(alt) => self.lower_stmt(alt, else_start),
            None => else_start,
        };

        // An empty branch never consumed its label, so the merge edge carries it.
        let merge = self.synthetic_node(NodeKind::Merge);
        self.connect(then_cursor, merge);
        self.connect(else_cursor, merge);
        Cursor::at(merge)
    }

    fn lower_loop(&mut self, span: Span, body: &Stmt, cursor: Cursor) -> Cursor {
        let header = self.source_node(span, NodeKind::Loop, "Loop");
        self.connect(cursor, header);

        let body_cursor = self.lower_stmt(body, Cursor::labeled(header, EdgeLabel::Do));
        self.cfg
            .add_edge(body_cursor.tail, header, EdgeKind::LoopBack, body_cursor.pending);

        let exit = self.synthetic_node(NodeKind::Exit);
        self.cfg
            .add_edge(header, exit, EdgeKind::Fallthrough, Some(EdgeLabel::Exit));
        Cursor::at(exit)
    }

    /// Wire `cursor.tail -> to`, spending the pending label.
    fn connect(&mut self, cursor: Cursor, to: NodeId) -> Cursor {
        self.cfg
            .add_edge(cursor.tail, to, EdgeKind::Fallthrough, cursor.pending);
        Cursor::at(to)
    }

    fn next_counter(&mut self) -> u32 {
        self.counter += 1;
        self.counter
    }

    fn source_node(&mut self, span: Span, kind: NodeKind, label: impl Into<String>) -> NodeId {
        let id = NodeId::Source {
            counter: self.next_counter(),
            start: span.start,
            end: span.end,
        };
        self.cfg.add_node(id, kind, label)
    }

    fn synthetic_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::Synthetic {
            counter: self.next_counter(),
        };
        self.cfg.add_node(id, kind, "")
    }
}
