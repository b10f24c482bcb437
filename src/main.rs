// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sandpiper main entry point - CLI, one-shot prompt, and line REPL.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use sandpiper::agent::{Agent, AgentCallbacks, AgentPhase, RunOutcome, RunReport, EMPTY_REPLY};
use sandpiper::config::{self, CliOptions, ResolvedConfig};
use sandpiper::providers::{create_adapter, create_transport};
use sandpiper::telemetry::{init_telemetry, TelemetryConfig};
use sandpiper::tools::ToolRegistry;
use sandpiper::workspace::{LocalSandbox, Workspace};
use sandpiper::{Result, VERSION};

/// Sandpiper - a coding agent that works inside a sandbox.
#[derive(Parser)]
#[command(name = "sandpiper")]
#[command(author, version, about = "A coding agent that works inside a sandbox", long_about = None)]
struct Cli {
    /// AI provider to use
    #[arg(short, long, env = "SANDPIPER_PROVIDER")]
    provider: Option<Provider>,

    /// Model to use
    #[arg(short, long, env = "SANDPIPER_MODEL")]
    model: Option<String>,

    /// Base URL for the API, or a relay that holds the credentials
    #[arg(long, env = "SANDPIPER_BASE_URL")]
    base_url: Option<String>,

    /// Workspace directory (defaults to the current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Run a single prompt and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    /// Maximum provider round-trips per request
    #[arg(long)]
    max_round_trips: Option<usize>,

    /// Show tool calls and run statistics
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show debug logs and a metrics report on exit
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported providers.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    /// Anthropic - Claude models
    Anthropic,
    /// Google - Gemini models
    Gemini,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration as JSON
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let telemetry = if cli.debug {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default()
    };
    let _telemetry = init_telemetry(&telemetry)?;

    let root = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let cli_options = CliOptions {
        provider: cli.provider.map(|p| p.to_string()),
        model: cli.model.clone(),
        base_url: cli.base_url.clone(),
        max_round_trips: cli.max_round_trips,
    };

    match cli.command {
        Some(Commands::Version) => {
            println!("sandpiper {VERSION}");
            return Ok(());
        }
        Some(Commands::Config) => {
            let config = config::load_config(&root, cli_options)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        None => {}
    }

    let config = config::load_config(&root, cli_options)
        .with_context(|| format!("loading configuration for {}", root.display()))?;
    let mut agent = build_agent(&config, root, cli.verbose)?;

    let result = match cli.prompt {
        Some(prompt) => run_once(&mut agent, &prompt, cli.verbose).await,
        None => run_repl(&mut agent, cli.verbose).await,
    };

    agent.registry().workspace().teardown().await;

    #[cfg(feature = "telemetry")]
    if cli.debug {
        let report = sandpiper::telemetry::GLOBAL_METRICS.snapshot().format_report();
        eprintln!("\n{}", report.dimmed());
    }

    result
}

fn build_agent(config: &ResolvedConfig, root: PathBuf, verbose: bool) -> Result<Agent> {
    let adapter = create_adapter(config)?;
    let transport = create_transport(config, adapter.as_ref())?;
    let workspace = Arc::new(Workspace::new(Arc::new(LocalSandbox::new(root))));
    let registry = Arc::new(ToolRegistry::with_defaults(workspace));

    Ok(Agent::new(
        adapter,
        transport,
        registry,
        config.agent_config(),
        terminal_callbacks(verbose),
    ))
}

/// Spinner shown while a provider request is in flight.
#[derive(Clone, Default)]
struct Spinner {
    bar: Arc<Mutex<Option<ProgressBar>>>,
}

impl Spinner {
    fn start(&self, message: &str) {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        if let Some(old) = self.slot().replace(bar) {
            old.finish_and_clear();
        }
    }

    fn stop(&self) {
        if let Some(bar) = self.slot().take() {
            bar.finish_and_clear();
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn terminal_callbacks(verbose: bool) -> AgentCallbacks {
    let spinner = Spinner::default();

    let phase_spinner = spinner.clone();
    let text_spinner = spinner.clone();

    AgentCallbacks {
        on_text: Some(Arc::new(move |text: &str| {
            text_spinner.stop();
            println!("{text}");
        })),
        on_tool_call: Some(Arc::new(move |_id: &str, name: &str, args: &serde_json::Value| {
            if verbose {
                println!("{} {} {}", "→".cyan(), name.bold(), args.to_string().dimmed());
            }
        })),
        on_tool_status: Some(Arc::new(|_id: &str, _name: &str, status: &str| {
            if status.starts_with("Error") {
                println!("  {} {}", "✗".red(), status.red());
            } else {
                println!("  {} {}", "✓".green(), status);
            }
        })),
        on_phase: Some(Arc::new(move |phase: AgentPhase| match phase {
            AgentPhase::AwaitingReply => phase_spinner.start("Thinking..."),
            _ => phase_spinner.stop(),
        })),
        ..AgentCallbacks::default()
    }
}

/// Run one submission with Ctrl-C wired to the cancel signal.
async fn submit(agent: &mut Agent, text: &str) -> Result<RunReport> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let listener = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let result = agent.submit_with_cancel(text, cancel_rx).await;
    listener.abort();
    Ok(result?)
}

fn print_report(report: &RunReport, verbose: bool) {
    match &report.outcome {
        RunOutcome::Completed if report.reply == EMPTY_REPLY => println!("{}", EMPTY_REPLY.dimmed()),
        RunOutcome::Completed => {}
        RunOutcome::Truncated { .. } | RunOutcome::RepetitionStopped | RunOutcome::Cancelled => {
            let notice = report.reply.rsplit("\n\n").next().unwrap_or(&report.reply);
            println!("{}", notice.yellow());
        }
        RunOutcome::ProviderFailed { .. } => eprintln!("{}", report.reply.red()),
    }

    if verbose {
        let stats = &report.stats;
        println!(
            "{}",
            format!(
                "({} round-trips, {} tool calls, {} tokens, {:.1}s)",
                stats.round_trips,
                stats.tool_call_count,
                stats.total_tokens,
                stats.duration_ms as f64 / 1000.0
            )
            .dimmed()
        );
    }
}

async fn run_once(agent: &mut Agent, prompt: &str, verbose: bool) -> Result<()> {
    let report = submit(agent, prompt).await?;
    print_report(&report, verbose);
    if matches!(report.outcome, RunOutcome::ProviderFailed { .. }) {
        anyhow::bail!("provider request failed");
    }
    Ok(())
}

async fn run_repl(agent: &mut Agent, verbose: bool) -> Result<()> {
    println!(
        "{} {} {}",
        "sandpiper".bold(),
        VERSION.dimmed(),
        agent.provider_label().dimmed()
    );
    println!("{}", "Type a request. /clear resets the conversation, /exit quits.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "›".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" | "exit" | "quit" => break,
            "/clear" => {
                agent.clear();
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        match submit(agent, input).await {
            Ok(report) => print_report(&report, verbose),
            Err(err) => eprintln!("{} {err:#}", "Error:".red().bold()),
        }
    }
    Ok(())
}
