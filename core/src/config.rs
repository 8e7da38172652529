//! Tunables for labeling, I/O detection, complexity badges and layout hints.

use serde::{Deserialize, Serialize};

use crate::error::{CodeVizError, Result};

/// Top-level configuration, usually loaded from `codeviz.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeVizConfig {
    /// Maximum number of characters kept from a statement's first line.
    pub snippet_width: usize,
    /// Regex patterns; a statement matching any of them is drawn as I/O.
    pub io_patterns: Vec<String>,
    pub complexity: ComplexityThresholds,
    pub layout: LayoutHints,
}

impl Default for CodeVizConfig {
    fn default() -> Self {
        Self {
            snippet_width: 20,
            io_patterns: vec![r"\bconsole\s*\.\s*[A-Za-z_$][\w$]*\s*\(".into()],
            complexity: ComplexityThresholds::default(),
            layout: LayoutHints::default(),
        }
    }
}

impl CodeVizConfig {
    pub fn validate(&self) -> Result<()> {
        if self.snippet_width == 0 {
            return Err(CodeVizError::config("snippet_width must be at least 1"));
        }
        if self.complexity.medium > self.complexity.high {
            return Err(CodeVizError::config(format!(
                "complexity.medium ({}) must not exceed complexity.high ({})",
                self.complexity.medium, self.complexity.high
            )));
        }
        self.layout.validate()
    }
}

/// Scores at or above `medium` are medium, at or above `high` are high.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComplexityThresholds {
    pub medium: u32,
    pub high: u32,
}

impl Default for ComplexityThresholds {
    fn default() -> Self {
        Self {
            medium: 5,
            high: 10,
        }
    }
}

/// Global graph attributes written at the top of the graph description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutHints {
    pub rank_dir: String,
    pub splines: String,
    pub font_name: String,
}

/// Values Graphviz accepts for `rankdir`.
pub const RANK_DIRS: &[&str] = &["TB", "LR", "BT", "RL"];
/// Values Graphviz accepts for `splines`.
pub const SPLINES: &[&str] = &[
    "none", "line", "false", "polyline", "curved", "ortho", "spline", "true",
];

impl LayoutHints {
    /// Both hints are written unquoted, so only known keywords are allowed.
    pub fn validate(&self) -> Result<()> {
        if !RANK_DIRS.contains(&self.rank_dir.as_str()) {
            return Err(CodeVizError::config(format!(
                "layout.rank_dir must be one of {}, got `{}`",
                RANK_DIRS.join("|"),
                self.rank_dir
            )));
        }
        if !SPLINES.contains(&self.splines.as_str()) {
            return Err(CodeVizError::config(format!(
                "layout.splines must be one of {}, got `{}`",
                SPLINES.join("|"),
                self.splines
            )));
        }
        Ok(())
    }
}

impl Default for LayoutHints {
    fn default() -> Self {
        Self {
            rank_dir: "TB".into(),
            splines: "polyline".into(),
            font_name: "Helvetica".into(),
        }
    }
}
