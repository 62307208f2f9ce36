//! Program Dependence Graph CLI
//!
//! # Usage
//!
//! ```bash
//! # One method, DOT on stdout
//! codegraph-pdg src/Account.java --method deposit
//!
//! # Every method under a tree, one JSON file per procedure
//! codegraph-pdg src/ --out-dir target/pdg --format json
//!
//! # DOT files rendered with Graphviz
//! codegraph-pdg src/ --out-dir target/pdg --render svg
//! ```
//!
//! Exits with status 0 iff every discovered procedure was analyzed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use codegraph_pdg::config::{ExportFormat, PdgConfig};
use codegraph_pdg::features::export::export;
use codegraph_pdg::features::syntax::{JavaAdapter, Procedure, SyntaxAdapter};
use codegraph_pdg::pipeline::BatchAnalyzer;

#[derive(Parser)]
#[command(name = "codegraph-pdg")]
#[command(about = "Program Dependence Graphs for Java methods", long_about = None)]
struct Cli {
    /// Java file or directory to scan for *.java files
    path: PathBuf,

    /// Only analyze methods with this name
    #[arg(short, long)]
    method: Option<String>,

    /// Write one file per procedure into this directory
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(short, long, value_parser = ExportFormat::from_str)]
    format: Option<ExportFormat>,

    /// Also render DOT output with Graphviz `dot`
    #[arg(long)]
    render: Option<RenderFormat>,

    /// YAML configuration file (version: 1)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (overrides the config file)
    #[arg(short, long)]
    threads: Option<usize>,

    /// More logging (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum RenderFormat {
    Svg,
    Png,
}

impl RenderFormat {
    fn as_str(self) -> &'static str {
        match self {
            RenderFormat::Svg => "svg",
            RenderFormat::Png => "png",
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PdgConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PdgConfig::default(),
    };
    if let Some(format) = cli.format {
        config.export.format = format;
    }
    if cli.threads.is_some() {
        config.batch.threads = cli.threads;
    }
    config.validate().context("invalid configuration")?;
    if cli.render.is_some() && config.export.format != ExportFormat::Dot {
        bail!("--render needs DOT output");
    }

    let adapter = JavaAdapter::new();
    let files = discover_files(&cli.path, &adapter)?;
    if files.is_empty() {
        bail!("no {} sources under {}", adapter.language(), cli.path.display());
    }
    info!(files = files.len(), "sources discovered");

    let mut procedures: Vec<Procedure> = Vec::new();
    let mut failed_files = 0usize;
    for file in &files {
        let source = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        match adapter.lower_source(&source, &file.display().to_string()) {
            Ok(found) => procedures.extend(found),
            Err(e) => {
                error!("{}", e);
                failed_files += 1;
            }
        }
    }

    if let Some(name) = &cli.method {
        procedures.retain(|p| &p.name == name);
        if procedures.is_empty() {
            bail!("no method named '{}' found", name);
        }
    }

    let result = BatchAnalyzer::new(&config).analyze(&procedures);
    for (key, e) in result.failures() {
        error!(procedure = key, "{}", e);
    }

    let to_stdout = cli.out_dir.is_none() && result.len() == 1 && cli.render.is_none();
    let out_dir = cli.out_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    if !to_stdout {
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
    }

    for entry in result.entries() {
        let Ok(analysis) = &entry.outcome else {
            continue;
        };
        let rendered = export(&analysis.pdg, &config.export)
            .with_context(|| format!("failed to export {}", entry.key))?;
        if to_stdout {
            print!("{}", rendered);
            continue;
        }

        let path = out_dir.join(output_file_name(&entry.key, config.export.format.extension()));
        fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "PDG written");

        if let Some(render) = cli.render {
            run_dot(&path, render)?;
        }
    }

    let ok = failed_files == 0 && result.all_succeeded();
    if !ok {
        warn!(
            failed_files,
            failed_procedures = result.failures().count(),
            "finished with failures"
        );
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Source files the adapter handles under `root`, in path order
fn discover_files(root: &Path, adapter: &dyn SyntaxAdapter) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let handled = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| adapter.handles_extension(ext));
        if entry.file_type().is_file() && handled {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// `Account.deposit(int)` -> `Account.deposit_int_.dot`
fn output_file_name(key: &str, extension: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '$') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.{}", stem, extension)
}

fn run_dot(path: &Path, render: RenderFormat) -> Result<()> {
    let target = path.with_extension(render.as_str());
    let status = Command::new("dot")
        .arg(format!("-T{}", render.as_str()))
        .arg(path)
        .arg("-o")
        .arg(&target)
        .status()
        .context("failed to run Graphviz `dot`")?;
    if !status.success() {
        bail!("`dot` exited with {} for {}", status, path.display());
    }
    info!(path = %target.display(), "rendered");
    Ok(())
}
