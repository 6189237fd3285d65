use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

mod applet;
mod color;
mod command;
mod config;
mod error;
mod history;
mod layout;
mod numeric;
mod parser;
mod render;
mod scheduler;
mod surface;

use applet::{Applet, TickOutcome};
use command::{CommandRunner, ShellRunner};
use config::ChartConfig;
use history::{default_history_path, FileHistoryStore, HistoryBuffer, MemoryHistoryStore};
use layout::EstimatedText;
use scheduler::Scheduler;
use surface::PngSurface;

const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(2);

type LogHandle = reload::Handle<LevelFilter, Registry>;

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

#[derive(Parser)]
#[command(name = "cmdchart")]
#[command(about = "Draw a compact panel chart from the output of a shell command", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: $XDG_CONFIG_HOME/cmd-chart/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command every update interval and keep the panel image current
    Run {
        /// PNG file to repaint after every tick
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a single frame
    Render {
        /// Use this text instead of running the configured command
        #[arg(short, long)]
        text: Option<String>,

        /// Output PNG path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse command output and print the rows as JSON
    Parse {
        /// Command output to parse
        text: String,

        /// Print the computed layout instead of the parsed elements
        #[arg(long)]
        layout: bool,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or reset the trend history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one setting, e.g. `config set chart-width 300`
    Set { key: String, value: String },
    /// Restore every setting to its default
    Reset,
    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print the stored samples, oldest first
    Show,
    /// Delete every stored sample
    Clear,
}

fn set_log_level(log: &LogHandle, verbose: bool) {
    if let Err(e) = log.reload(log_level(verbose)) {
        warn!("Could not change log level: {}", e);
    }
}

fn default_output_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cmd-chart")
        .join("panel.png")
}

fn load_history() -> HistoryBuffer {
    HistoryBuffer::load(Box::new(FileHistoryStore::new(default_history_path())))
}

/// Paint the current state into `output` and write the status text next to it.
fn paint(applet: &Applet, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let cfg = applet.config();
    let mut surface = PngSurface::new(output, cfg.chart_width, cfg.panel_height);
    let commands = applet.frame(&surface);
    let failures = render::replay(&commands, &mut surface);
    if failures > 0 {
        debug!("{} of {} draw commands failed", failures, commands.len());
    }
    surface.finish()?;

    fs::write(output.with_file_name("status.txt"), applet.status())?;
    Ok(())
}

fn repaint(applet: &Applet, output: &Path) {
    debug!("Requesting repaint");
    if let Err(e) = paint(applet, output) {
        warn!("Repaint failed: {:#}", e);
    }
}

async fn run_loop(
    config_path: &Path,
    output: &Path,
    runner: &dyn CommandRunner,
    log: &LogHandle,
    force_verbose: bool,
) -> Result<()> {
    let config = ChartConfig::load(config_path)?;
    let applet = Applet::new(config, load_history());

    info!("Starting chart, painting to {}", output.display());
    let mut scheduler = Scheduler::start(applet, runner).await;
    repaint(scheduler.applet(), output);

    let mut watcher = interval(CONFIG_POLL_INTERVAL);
    watcher.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = scheduler.next_tick() => {
                repaint(scheduler.applet(), output);
            }
            _ = watcher.tick() => {
                let next = match ChartConfig::load(config_path) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("Keeping previous settings: {}", e);
                        continue;
                    }
                };
                if next.verbose_logging != scheduler.applet().config().verbose_logging {
                    set_log_level(log, force_verbose || next.verbose_logging);
                }
                let refresh = scheduler.reconfigure(next).await;
                if refresh.canvas || refresh.command {
                    repaint(scheduler.applet(), output);
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ChartConfig::default_path);

    // Setup logging
    let verbose_setting = ChartConfig::load(&config_path)
        .map(|c| c.verbose_logging)
        .unwrap_or(false);
    let (filter, log_handle) = reload::Layer::new(log_level(cli.verbose || verbose_setting));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false));
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { output } => {
            let output = output.unwrap_or_else(default_output_path);
            run_loop(&config_path, &output, &ShellRunner, &log_handle, cli.verbose).await
        }

        Commands::Render { text, output } => {
            let config = ChartConfig::load(&config_path)?;
            let mut applet = Applet::new(config, load_history());
            let outcome = match text {
                Some(text) => applet.ingest(&text),
                None => applet.tick(&ShellRunner).await,
            };

            let output = output.unwrap_or_else(default_output_path);
            paint(&applet, &output)
                .with_context(|| format!("Failed to render {}", output.display()))?;
            println!("{} {}", "Rendered:".green().bold(), output.display());
            match outcome {
                TickOutcome::Updated { rows, elements } => {
                    println!("  {} elements in {} rows", elements, rows)
                }
                TickOutcome::Failed => println!("  {}", "Command failed".red()),
            }
            println!("  Trend samples: {}", applet.history().len());
            println!("  {}", applet.status());
            Ok(())
        }

        Commands::Parse { text, layout } => {
            let config = ChartConfig::load(&config_path)?;
            let history = HistoryBuffer::new(Box::new(MemoryHistoryStore::default()));
            let mut applet = Applet::new(config, history);
            applet.ingest(&text);

            let json = if layout {
                serde_json::to_string_pretty(&applet.layout(&EstimatedText))?
            } else {
                serde_json::to_string_pretty(applet.rows())?
            };
            println!("{}", json);
            Ok(())
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    let config = ChartConfig::load(&config_path)?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Set { key, value } => {
                    let mut config = ChartConfig::load(&config_path)?;
                    config.set(&key, &value)?;
                    config.save(&config_path)?;
                    println!("{} {} = {}", "Success:".green().bold(), key, value);
                }
                ConfigAction::Reset => {
                    ChartConfig::default().save(&config_path)?;
                    println!("{} Settings reset to defaults", "Success:".green().bold());
                }
                ConfigAction::Path => {
                    println!("{}", config_path.display());
                }
            }
            Ok(())
        }

        Commands::History { action } => {
            match action {
                HistoryAction::Show => {
                    let history = load_history();
                    if history.is_empty() {
                        println!("No trend samples recorded.");
                    }
                    for sample in history.snapshot().samples {
                        println!("{}", sample);
                    }
                }
                HistoryAction::Clear => {
                    let mut history = load_history();
                    let removed = history.len();
                    history.clear()?;
                    println!(
                        "{} Removed {} samples from {}",
                        "Success:".green().bold(),
                        removed,
                        default_history_path().display()
                    );
                }
            }
            Ok(())
        }
    }
}
