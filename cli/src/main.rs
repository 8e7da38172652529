use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use codeviz_core::{
    CodeViz, CodeVizConfig, CodeVizError, ComplexityTier, RevealRequest, SourceLanguage,
    Visualization, FIRST_FUNCTION,
};
use console::{style, Color};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CodeViz CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "codeviz",
    version,
    about = "Draw the control flow of the function under the cursor."
)]
struct Cli {
    /// Path to config file (YAML). Defaults to codeviz.yml if present.
    #[arg(long, global = true, default_value = "codeviz.yml")]
    config: PathBuf,

    /// Set config overrides (repeatable as key=value). Example: --set snippet_width=30
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", num_args = 0..)]
    sets: Vec<String>,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the control-flow graph of one function.
    Visualize {
        /// JavaScript or TypeScript source file.
        file: PathBuf,

        /// Byte offset of the cursor. 0 picks the first function in the file.
        #[arg(long, conflicts_with = "at")]
        offset: Option<usize>,

        /// Cursor position as LINE:COLUMN (1-based).
        #[arg(long, value_name = "LINE:COL")]
        at: Option<String>,

        /// Grammar to parse with. Guessed from the file extension when omitted.
        #[arg(long, value_name = "js|ts|tsx")]
        language: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Dot)]
        format: OutputFormat,

        /// Print graph statistics after the graph.
        #[arg(long)]
        stats: bool,
    },

    /// Show the source range behind a clicked node id.
    Reveal {
        /// Source file the graph was built from.
        file: PathBuf,

        /// Node id as emitted in the graph, e.g. `4|120|158`.
        #[arg(long)]
        node_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Title, complexity badge and dot graph.
    Dot,
    /// `{ graphText, complexityScore, functionName }` for editor hosts.
    Json,
    /// Mermaid flowchart.
    Mermaid,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        report_error(&err);
        std::process::exit(1);
    }
}

/// Failures outside the analyzer (I/O, config files, flags) are user-facing too.
fn is_user_facing(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CodeVizError>()
        .map_or(true, CodeVizError::is_user_facing)
}

fn report_error(err: &anyhow::Error) {
    if is_user_facing(err) {
        eprintln!("{} {:#}", style("error:").red().bold(), err);
    } else {
        eprintln!("{} {:?}", style("internal error:").red().bold(), err);
        eprintln!(
            "{}",
            style("This is a bug in codeviz. Re-run with --verbose and report it.").dim()
        );
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut cfg = load_config(&cli.config)?;
    apply_overrides(&mut cfg, &cli.sets)?;

    match cli.command {
        Command::Visualize {
            file,
            offset,
            at,
            language,
            format,
            stats,
        } => {
            let codeviz = CodeViz::new(cfg)?;
            run_visualize(&codeviz, &file, offset, at.as_deref(), language.as_deref(), format, stats)
        }
        Command::Reveal { file, node_id } => run_reveal(&file, &node_id),
    }
}

fn run_visualize(
    codeviz: &CodeViz,
    file: &Path,
    offset: Option<usize>,
    at: Option<&str>,
    language: Option<&str>,
    format: OutputFormat,
    stats: bool,
) -> anyhow::Result<()> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let language = resolve_language(file, language)?;
    let offset = match (offset, at) {
        (Some(offset), _) => offset,
        (None, Some(at)) => offset_for_position(&source, at)?,
        (None, None) => FIRST_FUNCTION,
    };
    tracing::debug!(file = %file.display(), offset, language = language.as_str(), "visualizing");

    let analysis = codeviz.analyze(&source, offset, language)?;
    let graph_text = match format {
        OutputFormat::Mermaid => analysis.cfg.to_mermaid(),
        OutputFormat::Dot | OutputFormat::Json => codeviz.render(&analysis.cfg)?,
    };
    let viz = Visualization {
        graph_text,
        complexity_score: analysis.complexity,
        function_name: analysis.target.name.clone(),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&viz)?),
        OutputFormat::Dot | OutputFormat::Mermaid => {
            print_title(&viz, codeviz.config());
            println!("{}", viz.graph_text.trim_end());
        }
    }

    if stats {
        let s = analysis.cfg.stats();
        eprintln!(
            "{} nodes, {} edges, {} decisions, {} loops, {} returns, {} after return",
            s.nodes, s.edges, s.decisions, s.loops, s.returns, s.nodes_after_return
        );
    }
    Ok(())
}

fn print_title(viz: &Visualization, cfg: &CodeVizConfig) {
    let tier = viz.complexity_tier(&cfg.complexity);
    let badge = style(format!("{} (Complexity)", viz.complexity_score))
        .fg(badge_color(tier))
        .bold();
    eprintln!(
        "{} {} [{}]",
        style(&viz.function_name).bold(),
        badge,
        tier.as_str()
    );
}

/// Terminal color for the tier's badge color name.
fn badge_color(tier: ComplexityTier) -> Color {
    match tier.color() {
        "green" => Color::Green,
        "orange" => Color::Color256(208),
        _ => Color::Red,
    }
}

fn run_reveal(file: &Path, node_id: &str) -> anyhow::Result<()> {
    let source = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let reveal = RevealRequest::from_node_id(node_id)
        .ok_or_else(|| anyhow!("node `{node_id}` has no source range"))?;
    if reveal.start > reveal.end || reveal.end > source.len() {
        bail!(
            "range {}..{} is outside {} ({} bytes)",
            reveal.start,
            reveal.end,
            file.display(),
            source.len()
        );
    }
    let text = source
        .get(reveal.start..reveal.end)
        .ok_or_else(|| anyhow!("range {}..{} is not on a character boundary", reveal.start, reveal.end))?;
    let (start_line, start_col) = byte_to_location(&source, reveal.start);
    let (end_line, end_col) = byte_to_location(&source, reveal.end);
    println!(
        "{}:{}:{}-{}:{}",
        style(file.display()).cyan(),
        start_line,
        start_col,
        end_line,
        end_col
    );
    println!("{text}");
    Ok(())
}

fn resolve_language(file: &Path, name: Option<&str>) -> anyhow::Result<SourceLanguage> {
    match name {
        Some(name) => SourceLanguage::from_name(name)
            .ok_or_else(|| anyhow!("unknown language `{name}` (expected js, ts or tsx)")),
        None => Ok(SourceLanguage::from_path(file).unwrap_or_default()),
    }
}

fn load_config(path: &Path) -> anyhow::Result<CodeVizConfig> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let cfg: CodeVizConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid config structure in {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    } else {
        tracing::debug!(cwd = ?env::current_dir().ok(), "no config file, using defaults");
        Ok(CodeVizConfig::default())
    }
}

fn apply_overrides(cfg: &mut CodeVizConfig, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        match key {
            "snippet_width" => {
                cfg.snippet_width = val
                    .parse::<usize>()
                    .with_context(|| format!("snippet_width expects a number, got `{val}`"))?;
            }
            "complexity.medium" => {
                cfg.complexity.medium = val
                    .parse::<u32>()
                    .with_context(|| format!("complexity.medium expects a number, got `{val}`"))?;
            }
            "complexity.high" => {
                cfg.complexity.high = val
                    .parse::<u32>()
                    .with_context(|| format!("complexity.high expects a number, got `{val}`"))?;
            }
            "io_patterns" => {
                cfg.io_patterns = val
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect();
            }
            "layout.rank_dir" => cfg.layout.rank_dir = val.to_string(),
            "layout.splines" => cfg.layout.splines = val.to_string(),
            "layout.font_name" => cfg.layout.font_name = val.to_string(),
            _ => tracing::warn!(key, "ignoring unknown config override"),
        }
    }
    Ok(())
}

/// Convert a 1-based `LINE:COL` position into a byte offset.
fn offset_for_position(text: &str, at: &str) -> anyhow::Result<usize> {
    let (line, col) = at
        .split_once(':')
        .ok_or_else(|| anyhow!("expected LINE:COL, got `{at}`"))?;
    let line: usize = line.trim().parse().context("line must be a number")?;
    let col: usize = col.trim().parse().context("column must be a number")?;
    if line == 0 || col == 0 {
        bail!("line and column are 1-based");
    }

    let mut line_start = 0usize;
    for (idx, current) in text.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let within = current
                .char_indices()
                .nth(col - 1)
                .map(|(i, _)| i)
                .unwrap_or(current.len());
            return Ok(line_start + within);
        }
        line_start += current.len();
    }
    bail!("line {line} is past the end of the file")
}

fn byte_to_location(text: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (idx, ch) in text.char_indices() {
        if idx >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
