// Control Sweep - command line entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use control_sweep::models::settings::{ConfigUpdate, HarnessConfig, RunMode};
use control_sweep::services::backend::HttpBackend;
use control_sweep::storage::{load_catalog, load_policy, OutcomeLedger};
use control_sweep::utils::logging;
use control_sweep_core::{BackendProbe, RunSummary};
use control_sweep_verification::BudgetTier;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "control-sweep",
    version,
    about = "Exhaustive control discovery and mutation verification for RAG dashboards"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep against the dashboard
    Run(RunArgs),
    /// List the surface catalog
    Surfaces(SurfacesArgs),
    /// Recompute the summary of an existing ledger
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// preflight (inventory only) or full
    #[arg(long)]
    mode: Option<RunMode>,
    /// Skip controls already terminal in the ledger
    #[arg(long)]
    resume: bool,
    /// Allow destructive controls to be exercised
    #[arg(long)]
    allow_destructive: bool,
    /// One action per distinct select option
    #[arg(long)]
    select_all_options: bool,
    /// Disable the cross-surface propagation scan
    #[arg(long)]
    no_propagation: bool,
    /// Metrics sampling budget: low, medium or high
    #[arg(long)]
    budget: Option<BudgetTier>,
    /// Ledger path
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    ui_base: Option<String>,
    /// Corpus scope for configuration snapshots
    #[arg(long)]
    corpus: Option<String>,
    /// Chat probes per retrieval-impacting mutation
    #[arg(long)]
    probes: Option<usize>,
    /// Discovery passes per surface
    #[arg(long)]
    max_passes: Option<usize>,
    /// Policy file (TOML) replacing the built-in lexicons
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Surface catalog file (TOML)
    #[arg(long)]
    surfaces: Option<PathBuf>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
    /// Attach to a running browser's DevTools websocket
    #[arg(long)]
    browser_ws: Option<String>,
}

impl RunArgs {
    fn into_update(self) -> ConfigUpdate {
        let flag = |set: bool| if set { Some(true) } else { None };
        ConfigUpdate {
            api_base: self.api_base,
            ui_base: self.ui_base,
            allow_destructive: flag(self.allow_destructive),
            select_all_options: flag(self.select_all_options),
            propagation_scan: if self.no_propagation { Some(false) } else { None },
            settle_ms: None,
            metrics_budget: self.budget,
            resume: flag(self.resume),
            mode: self.mode,
            output: self.output,
            corpus: self.corpus,
            probes_per_mutation: self.probes,
            max_passes: self.max_passes,
            policy_file: self.policy,
            surfaces_file: self.surfaces,
            headless: if self.headed { Some(false) } else { None },
            browser_ws: self.browser_ws,
        }
    }
}

#[derive(Args, Debug)]
struct SurfacesArgs {
    /// Surface catalog file (TOML)
    #[arg(long)]
    surfaces: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Ledger file (JSONL)
    ledger: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Surfaces(args) => surfaces(args),
        Commands::Summarize(args) => summarize(args),
    }
}

fn print_summary(summary: &RunSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = HarnessConfig::from_env().context("reading SWEEP_* environment")?;
    config.apply_update(args.into_update());
    config.validate()?;

    let policy = load_policy(&config)?;
    let catalog = load_catalog(&config)?;
    let backend: Arc<dyn BackendProbe> =
        Arc::new(HttpBackend::new(&config.api_base, Duration::from_secs(30))?);

    info!(
        api_base = %config.api_base,
        ui_base = %config.ui_base,
        mode = %config.mode,
        output = %config.output.display(),
        "configuration loaded"
    );

    #[cfg(feature = "browser")]
    {
        use control_sweep::services::browser::BrowserSession;
        use control_sweep::services::orchestrator::Orchestrator;

        let session = Arc::new(BrowserSession::launch(&config).await?);
        let orchestrator = Orchestrator::new(
            config,
            policy,
            catalog,
            session.clone(),
            session.clone(),
            backend,
        );
        let result = orchestrator.run().await;
        session.close().await;
        return print_summary(&result?);
    }

    #[cfg(not(feature = "browser"))]
    {
        let _ = (policy, catalog, backend);
        Err(control_sweep::services::browser::browser_unavailable().into())
    }
}

fn surfaces(args: SurfacesArgs) -> Result<()> {
    let config = HarnessConfig {
        surfaces_file: args.surfaces,
        ..HarnessConfig::default()
    };
    let catalog = load_catalog(&config)?;
    let chat = catalog.chat();
    let smoke = catalog.smoke_surfaces();

    for surface in catalog.surfaces() {
        let mut tags = Vec::new();
        if *surface == chat {
            tags.push("chat");
        }
        if smoke.contains(surface) {
            tags.push("smoke");
        }
        println!(
            "{:<36} {:<32} {}{}",
            surface.surface_key(),
            surface.path(),
            surface.label,
            if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(","))
            }
        );
    }
    Ok(())
}

fn summarize(args: SummarizeArgs) -> Result<()> {
    let records = OutcomeLedger::replay(&args.ledger)
        .with_context(|| format!("reading {}", args.ledger.display()))?;
    let summary = RunSummary::from_records(&records);
    print_summary(&summary)
}
