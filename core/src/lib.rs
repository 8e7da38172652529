//! CodeViz core analysis engine.
//! Locates the function under the cursor in JavaScript or TypeScript source,
//! scores its complexity and renders its control flow as a dot graph whose
//! node ids point back into the source.

use serde::{Deserialize, Serialize};

pub mod ast;
pub mod cfg;
pub mod complexity;
pub mod config;
pub mod dot;
pub mod error;
pub mod locator;
pub mod parser;

pub use ast::{FunctionBody, FunctionTarget, LoopKind, Span, Stmt, MAX_STATEMENT_DEPTH};
pub use cfg::{
    build_cfg, CfgEdge, CfgNode, CfgStats, ControlFlowGraph, EdgeKind, EdgeLabel, LabelRules,
    NodeId, NodeKind,
};
pub use complexity::{score_function, ComplexityTier, BASE_COMPLEXITY};
pub use config::{CodeVizConfig, ComplexityThresholds, LayoutHints};
pub use error::{CodeVizError, Result};
pub use locator::{FunctionKind, FIRST_FUNCTION};
pub use parser::SourceLanguage;

/// Input from the editor host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizeRequest {
    pub source_text: String,
    /// Byte offset of the cursor; [`FIRST_FUNCTION`] selects the first function.
    pub cursor_offset: usize,
    #[serde(default)]
    pub language: SourceLanguage,
}

/// Output for the render host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub graph_text: String,
    pub complexity_score: u32,
    pub function_name: String,
}

impl Visualization {
    pub fn complexity_tier(&self, thresholds: &ComplexityThresholds) -> ComplexityTier {
        ComplexityTier::for_score(self.complexity_score, thresholds)
    }
}

/// Source range a render host asks the editor to reveal after a node click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealRequest {
    pub start: usize,
    pub end: usize,
}

impl RevealRequest {
    /// Decode the clicked element id: fields two and three of a `|`-separated id.
    pub fn from_node_id(id: &str) -> Option<Self> {
        if !id.contains('|') {
            return None;
        }
        let mut fields = id.split('|').skip(1);
        let start = fields.next()?.trim().parse().ok()?;
        let end = fields.next()?.trim().parse().ok()?;
        Some(Self { start, end })
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Everything computed for one function, before serialization.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub target: FunctionTarget,
    pub complexity: u32,
    pub cfg: ControlFlowGraph,
}

/// Configured analyzer. Holds no per-request state, so one instance can serve
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct CodeViz {
    config: CodeVizConfig,
    rules: LabelRules,
}

impl CodeViz {
    pub fn new(config: CodeVizConfig) -> Result<Self> {
        config.validate()?;
        let rules = LabelRules::from_config(&config)?;
        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &CodeVizConfig {
        &self.config
    }

    /// Parse, locate, score and build the graph for the function at `offset`.
    pub fn analyze(&self, source: &str, offset: usize, language: SourceLanguage) -> Result<Analysis> {
        let tree = parser::parse_source(source, language)?;
        let node = locator::locate_function(tree.root_node(), offset)?;
        let target =
            FunctionTarget::from_node(node, source).ok_or(CodeVizError::NoFunctionFound)?;

        let complexity = node
            .child_by_field_name("body")
            .map(score_function)
            .unwrap_or(BASE_COMPLEXITY);
        tracing::debug!(function = %target.name, complexity, "scored function");

        let cfg = build_cfg(&target, &self.rules);
        Ok(Analysis {
            target,
            complexity,
            cfg,
        })
    }

    pub fn render(&self, cfg: &ControlFlowGraph) -> Result<String> {
        dot::to_dot(cfg, &self.config.layout)
    }

    pub fn visualize(&self, request: &VisualizeRequest) -> Result<Visualization> {
        let analysis = self.analyze(
            &request.source_text,
            request.cursor_offset,
            request.language,
        )?;
        let graph_text = self.render(&analysis.cfg)?;
        Ok(Visualization {
            graph_text,
            complexity_score: analysis.complexity,
            function_name: analysis.target.name,
        })
    }
}
