//! flamecheck CLI.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use std::path::{Path, PathBuf};

use flamecheck::{
    CommandProbe, Config, DiffMode, FlameNode, FsStore, Invocation, InvocationResponse,
    InvokeOptions, ProfileStore, RawProfile, ReplayProbe, diff, invoke, write_text,
};

mod cli_logger;

use cli_logger::CliLogger;

#[derive(Parser)]
#[command(name = "flamecheck")]
#[command(about = "Profile a target repeatedly and diff its flamegraph against the last run")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, default_value = "flamecheck.toml")]
    config: PathBuf,

    /// Emit JSON instead of the pretty renderer
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Profile a target, compare with the stored baseline and store the median run.
    Run {
        target: Option<String>,
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        mode: Option<DiffMode>,
    },
    /// Aggregate pre-recorded .cpuprofile runs against the store.
    Replay {
        #[arg(required = true)]
        profiles: Vec<PathBuf>,
        /// Label reported as the target.
        #[arg(long, default_value = "replay")]
        target: String,
        #[arg(long)]
        mode: Option<DiffMode>,
    },
    /// Show the merged flamegraph of one profile.
    Flame {
        profile: PathBuf,
        #[arg(long, value_enum, default_value_t = FlameFormat::Folded)]
        format: FlameFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare two profiles directly.
    Diff {
        previous: PathBuf,
        current: PathBuf,
        #[arg(long)]
        mode: Option<DiffMode>,
    },
    /// Show the most recently stored profile.
    Latest,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlameFormat {
    Folded,
    Json,
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let logger = CliLogger::new(cli.json, cli.no_color);
    match execute(&cli, &logger) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            logger.print_error(&format!("{err:#}"));
            std::process::exit(1);
        }
    }
}

fn execute(cli: &Cli, logger: &CliLogger) -> Result<i32> {
    let config = Config::load_optional(&cli.config);
    config.validate()?;
    let store = FsStore::new(config.store_dir());

    match &cli.command {
        Command::Run {
            target,
            samples,
            mode,
        } => {
            let target = config.resolve_target(target.as_deref())?;
            if config.probe.command.is_empty() {
                bail!("probe.command is not configured in {}", cli.config.display());
            }
            let mut probe = CommandProbe::new(&config.probe.command)?;
            let options = InvokeOptions {
                samples: samples.unwrap_or(config.samples),
                mode: mode.unwrap_or(config.diff_mode),
            };
            let response = invoke(&Invocation { target }, &mut probe, &store, options);
            finish(logger, &response)
        }
        Command::Replay {
            profiles,
            target,
            mode,
        } => {
            let mut probe = ReplayProbe::new(profiles.clone());
            let options = InvokeOptions {
                samples: profiles.len(),
                mode: mode.unwrap_or(config.diff_mode),
            };
            let request = Invocation {
                target: target.clone(),
            };
            let response = invoke(&request, &mut probe, &store, options);
            finish(logger, &response)
        }
        Command::Flame {
            profile,
            format,
            out,
        } => {
            let flame = FlameNode::from_profile(&read_profile(profile)?)?;
            match format {
                FlameFormat::Folded => {
                    let text = flame.folded().join("\n");
                    if let Some(path) = out {
                        write_text(path, &text)?;
                    }
                    logger.print_text(&text);
                }
                FlameFormat::Json => {
                    if let Some(path) = out {
                        flamecheck::write_json(path, &flame)?;
                    }
                    logger.print_serialized(&flame)?;
                }
            }
            Ok(0)
        }
        Command::Diff {
            previous,
            current,
            mode,
        } => {
            let previous = FlameNode::from_profile(&read_profile(previous)?)?;
            let current = FlameNode::from_profile(&read_profile(current)?)?;
            let outcome = diff(Some(&previous), &current, mode.unwrap_or(config.diff_mode));
            logger.print_serialized(&serde_json::json!({
                "summary": outcome.summary(),
                "diff": outcome,
            }))?;
            Ok(0)
        }
        Command::Latest => {
            match store.get_latest()? {
                Some(stored) => {
                    let flame = FlameNode::from_profile(&stored.profile)?;
                    logger.print_serialized(&serde_json::json!({
                        "location": stored.location,
                        "hash": stored.profile.content_hash()?,
                        "executionTime": flame.total_time(),
                        "nodes": flame.node_count(),
                        "depth": flame.depth(),
                    }))?;
                }
                None => logger.print_serialized(&serde_json::json!({
                    "location": null,
                    "store": store.dir(),
                }))?,
            }
            Ok(0)
        }
    }
}

fn finish(logger: &CliLogger, response: &InvocationResponse) -> Result<i32> {
    logger.print_response(response)?;
    Ok(if response.status_code() == 200 { 0 } else { 2 })
}

fn read_profile(path: &Path) -> Result<RawProfile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    RawProfile::from_json(&bytes).with_context(|| format!("parsing {}", path.display()))
}
