use crate::engine::PipelineEngine;
use crate::model::{CommandNode, PipelineConfig};
use crate::orchestrator::DEFAULT_QUIESCENCE;
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::{IsTerminal, Write};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

const AFTER_HELP: &str = "\
Examples:
  curl <API-endpoint> | ptrap jq
  cat <file> | ptrap grep -i
  ptrap -r \"cat file.json\" jq

Keys:
  Ctrl+C quit, Enter copy output, Ctrl+Y copy pipeline, | add command,
  Tab / Shift+Tab next / previous command, Ctrl+D delete command, F1 help";

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ptrap",
    version,
    about = "Interactively build a pipeline over piped stdin or a command's stdout",
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Run this shell command and use its stdout as input instead of stdin
    #[arg(short, long, value_name = "CMD")]
    pub run: Option<String>,

    /// Quiet period after the last keystroke before the pipeline reruns
    #[arg(long, default_value_t = humantime::Duration::from(DEFAULT_QUIESCENCE))]
    pub debounce: humantime::Duration,

    /// Run the initial pipeline once, print its output and exit (no TUI)
    #[arg(long)]
    pub print: bool,

    /// Write logs to this file (defaults to the user cache dir when RUST_LOG is set)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<std::path::PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Initial pipeline command and its fixed arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

/// Build a `PipelineConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> PipelineConfig {
    let seed = args
        .command
        .split_first()
        .filter(|(cmd, _)| !cmd.trim().is_empty())
        .map(|(cmd, rest)| CommandNode::new(cmd.clone(), rest.to_vec()));

    PipelineConfig {
        seed,
        run_command: args.run.clone(),
        debounce: args.debounce.into(),
        print_only: args.print,
        log_file: args.log_file.clone(),
        log_level: args.log_level.clone(),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);

    // Nothing piped in and nothing to run: there is no input to work on.
    if cfg.run_command.is_none() && std::io::stdin().is_terminal() {
        Cli::command().print_help().context("print help")?;
        println!();
        return Ok(());
    }

    crate::logging::init(&cfg)?;

    let input = ingest_input(&cfg).await?;
    tracing::info!(
        bytes = input.len(),
        seed = ?cfg.seed.as_ref().map(CommandNode::display),
        "input ingested"
    );

    if cfg.print_only {
        return run_print(cfg, input).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(cfg, input).await
    }
    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        run_print(cfg, input).await
    }
}

/// Read the pipeline input from `--run` or stdin, trimmed of surrounding ASCII whitespace.
async fn ingest_input(cfg: &PipelineConfig) -> Result<Vec<u8>> {
    let raw = match cfg.run_command.as_deref() {
        Some(cmd) => {
            let out = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .stdin(Stdio::null())
                .stderr(Stdio::inherit())
                .output()
                .await
                .with_context(|| format!("execute --run command `{cmd}`"))?;
            if !out.status.success() {
                anyhow::bail!("--run command `{cmd}` failed: {}", out.status);
            }
            out.stdout
        }
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("read stdin")?;
            buf
        }
    };
    Ok(raw.trim_ascii().to_vec())
}

/// Run the seed pipeline once and write its output to stdout. Ctrl+C cancels the run.
async fn run_print(cfg: PipelineConfig, input: Vec<u8>) -> Result<()> {
    let stages: Vec<CommandNode> = cfg.seed.into_iter().collect();
    let cancel = CancellationToken::new();
    let engine = PipelineEngine::new(stages, Arc::from(input));

    let output = tokio::select! {
        out = engine.run(cancel.clone()) => out,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            None
        }
    };

    if let Some(output) = output {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(&output)
            .context("write output")?;
        if !output.ends_with(b"\n") {
            writeln!(stdout).context("write output")?;
        }
        stdout.flush().context("flush stdout")?;
    }
    Ok(())
}
