use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use typdown_core::{
    CompileOptions, Diagnostic, DiagnosticSeverity, MathSyntax, Node, apply_transforms,
    compile_with_options,
};

// Applies to the binary and to `typdown_core` alike.
const DEFAULT_LOG_FILTER: &str = "typdown=warn";

/// Compile an mdast JSON document to Typst source.
#[derive(Parser, Debug)]
#[command(name = "typdown", version)]
struct Cli {
    /// mdast JSON file; reads stdin when omitted
    input: Option<PathBuf>,

    /// Write Typst source here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the image asset list as JSON
    #[arg(long, value_name = "MANIFEST")]
    assets: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = MathArg::Typst)]
    math: MathArg,

    /// Typst file placed before the document
    #[arg(long, value_name = "FILE")]
    preamble: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DiagnosticsMode::Pretty)]
    diagnostics: DiagnosticsMode,

    /// Skip image attribute lifting and table span merging
    #[arg(long)]
    no_transforms: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MathArg {
    Typst,
    Latex,
}

impl From<MathArg> for MathSyntax {
    fn from(arg: MathArg) -> Self {
        match arg {
            MathArg::Typst => MathSyntax::Typst,
            MathArg::Latex => MathSyntax::Latex,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DiagnosticsMode {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("TYPDOWN_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let json = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };
    let mut root: Node = serde_json::from_str(&json).context("input is not an mdast document")?;

    let preamble = match &cli.preamble {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read preamble {}", path.display()))?,
        ),
        None => None,
    };
    let options = CompileOptions {
        math: cli.math.into(),
        preamble,
    };

    if cli.no_transforms {
        tracing::debug!("tree transforms disabled");
    } else {
        apply_transforms(&mut root)?;
    }
    let compiled = compile_with_options(&root, &options)?;

    emit_diagnostics(&compiled.diagnostics, cli.diagnostics)?;

    match &cli.output {
        Some(path) => fs::write(path, &compiled.source)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .write_all(compiled.source.as_bytes())
            .context("failed to write stdout")?,
    }

    if let Some(path) = &cli.assets {
        let manifest = serde_json::to_string_pretty(&compiled.assets)?;
        fs::write(path, manifest + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}

fn emit_diagnostics(diagnostics: &[Diagnostic], mode: DiagnosticsMode) -> Result<()> {
    match mode {
        DiagnosticsMode::Json => {
            eprintln!("{}", serde_json::to_string_pretty(diagnostics)?);
        }
        DiagnosticsMode::Pretty => {
            for diagnostic in diagnostics {
                eprintln!("{}", diagnostic_to_pretty(diagnostic));
            }
        }
    }
    Ok(())
}

fn diagnostic_to_pretty(diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        DiagnosticSeverity::Error => "error",
        DiagnosticSeverity::Warning => "warning",
    };
    format!("{}[{}]: {}", severity, diagnostic.code, diagnostic.message)
}
