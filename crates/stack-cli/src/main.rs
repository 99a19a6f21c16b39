// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use config::StackConfig;
use lifecycle::{LifecycleEngine, UpdateOutcome};
use model_runtime::{OllamaRuntime, RegistryCatalog, RuntimeTimeouts};
use protocol::{BulkReport, QualifiedName};

mod render;

#[derive(Parser)]
#[command(name = "llmstack", version, about = "local model runtime console")]
struct Cli {
    /// optional path to a models.yml / models.toml (applies to all subcommands)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// runtime liveness, loaded models, capacity and pending updates
    Status {
        /// print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// configured models in priority order
    Models,

    /// models in local storage; loaded ones are marked with '*'
    Installed,

    /// download if needed, enforce the capacity ceiling, then probe
    Activate {
        /// catalog key, e.g. "qwen"
        key: String,
    },

    /// unload a model from memory
    Deactivate { name: String },

    /// delete a model from local storage
    Remove { name: String },

    /// list (and optionally apply) upstream updates
    Updates(UpdateOpts),

    /// pull every configured model again
    Refresh,

    /// show the effective policy values and check the file for problems
    Validate,

    /// print runtime metadata for a model as JSON
    Info { name: String },

    /// start the runtime daemon if it is not answering
    Serve,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct UpdateOpts {
    /// installed qualified name to update
    #[arg(long)]
    apply: Option<String>,

    /// apply every pending update
    #[arg(long)]
    apply_all: bool,
}

fn runtime_timeouts(config: &StackConfig) -> RuntimeTimeouts {
    let t = config.timeouts;
    RuntimeTimeouts {
        probe: t.probe,
        command: t.command,
        generate: t.generate,
        show: t.show,
        pull: t.pull,
        pull_interactive: t.pull_interactive,
    }
}

fn build_engine(config: StackConfig) -> LifecycleEngine {
    let runtime = OllamaRuntime::new(config.runtime_endpoint(), runtime_timeouts(&config));
    let catalog = RegistryCatalog::new(config.registry_endpoint(), config.timeouts.catalog);
    LifecycleEngine::new(config, Arc::new(runtime), Arc::new(catalog))
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

fn report_bulk(report: &BulkReport) {
    for failure in &report.failures {
        eprintln!("{}: {}", failure.name, failure.reason);
    }
    for name in &report.not_attempted {
        eprintln!("{name}: not attempted");
    }
    println!("{report}");
}

/// Commands that change runtime state need the daemon up first.
async fn require_runtime(engine: &LifecycleEngine) -> Result<()> {
    if !engine.runtime_installed().await {
        bail!("ollama CLI not found; install it from https://ollama.com/download");
    }
    if !engine.ensure_runtime_running().await {
        bail!(
            "ollama is not answering at {}",
            engine.config().runtime_endpoint()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    util::logging::init_tracing();

    let cli = Cli::parse();
    debug!("llmstack: {:?}", cli.command);

    let config = StackConfig::load(cli.config.as_deref())?;
    let engine = build_engine(config);

    let ok = match cli.command {
        Commands::Status { json } => {
            let summary = engine.status_summary().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_lines(render::status(&summary));
            }
            true
        }
        Commands::Models => {
            print_lines(render::catalog(engine.config().list_models()));
            true
        }
        Commands::Installed => {
            let models = engine.installed_models().await?;
            print_lines(render::installed(&models));
            true
        }
        Commands::Activate { key } => {
            require_runtime(&engine).await?;
            match engine.activate(&key).await {
                Ok(()) => {
                    println!("{key} is ready");
                    true
                }
                Err(e) => {
                    eprintln!("activation failed: {e}");
                    false
                }
            }
        }
        Commands::Deactivate { name } => {
            engine.deactivate(&QualifiedName::parse(name.as_str())).await?;
            println!("{name} stopped");
            true
        }
        Commands::Remove { name } => {
            engine.remove(&QualifiedName::parse(name.as_str())).await?;
            println!("{name} removed");
            true
        }
        Commands::Updates(opts) => run_updates(&engine, opts).await?,
        Commands::Refresh => {
            require_runtime(&engine).await?;
            let report = engine.pull_all_configured().await;
            report_bulk(&report);
            report.all_succeeded()
        }
        Commands::Validate => {
            let problems = engine.config().validate();
            print_lines(render::config_view(engine.config()));
            for problem in &problems {
                eprintln!("error: {problem}");
            }
            if problems.is_empty() {
                println!("configuration is valid");
            }
            problems.is_empty()
        }
        Commands::Info { name } => match engine.model_info(&QualifiedName::parse(name.as_str())).await {
            Some(info) => {
                println!("{}", serde_json::to_string_pretty(&info)?);
                true
            }
            None => {
                eprintln!("no metadata available for {name}");
                false
            }
        },
        Commands::Serve => {
            if engine.ensure_runtime_running().await {
                println!("ollama is running at {}", engine.config().runtime_endpoint());
                true
            } else {
                eprintln!("could not start ollama");
                false
            }
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run_updates(engine: &LifecycleEngine, opts: UpdateOpts) -> Result<bool> {
    if opts.apply_all {
        require_runtime(engine).await?;
        let report = engine.apply_all_updates().await;
        report_bulk(&report);
        return Ok(report.all_succeeded());
    }

    if let Some(name) = opts.apply {
        require_runtime(engine).await?;
        return Ok(match engine.apply_update_if_available(&name).await {
            UpdateOutcome::UpToDate => {
                println!("{name} is up to date");
                true
            }
            UpdateOutcome::Updated { from, to } => {
                println!("{from} updated to {to}");
                true
            }
            UpdateOutcome::Failed { from, to, reason } => {
                eprintln!("update {from} -> {to} failed: {reason}");
                false
            }
            UpdateOutcome::Interrupted { from, to } => {
                eprintln!("update {from} -> {to} cancelled");
                false
            }
        });
    }

    let available = engine.detect_updates().await;
    if available.is_empty() {
        println!("all models are up to date");
    } else {
        print_lines(render::updates(&available));
    }
    if !engine.runtime_running().await {
        warn!("llmstack: runtime is not running; installed list may be incomplete");
    }
    Ok(true)
}
