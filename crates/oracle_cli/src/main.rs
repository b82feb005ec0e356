mod config_loader;

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use big_road::{RoadColumn, RoadTrend};
use clap::{Args, Parser, Subcommand};
use core_types::{parse_sequence, Forecast, ForecastKind, ModuleId, Outcome};
use learning_tracker::ModuleAccuracy;
use oracle_engine::{OracleEngine, SessionStatus};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "oracle", about = "Baccarat pattern oracle", version)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,
    /// Engine config (TOML). Missing file means built-in defaults.
    #[arg(long, global = true, env = "ORACLE_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// Print Prometheus metrics on exit.
    #[arg(long, global = true, default_value_t = false)]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a sequence hand by hand and report the forecast for the next one.
    Analyze(AnalyzeArgs),
    /// Historical hit rate of every module over a sequence.
    Backtest(BacktestArgs),
    /// Interactive session on stdin: P/B/T, undo, reset, road, acc, status, quit.
    Session,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Outcomes such as "PPBT BPB".
    #[arg(long)]
    sequence: String,
}

#[derive(Args, Debug)]
struct BacktestArgs {
    #[arg(long)]
    sequence: String,
    /// Only replay the last N prefixes.
    #[arg(long)]
    lookback: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AnalyzeReport {
    status: SessionStatus,
    forecast: Forecast,
    big_road: Vec<RoadColumn>,
    trend: Option<RoadTrend>,
    module_accuracy: BTreeMap<ModuleId, f64>,
    live_module_accuracy: BTreeMap<ModuleId, f64>,
    outcome_accuracy: BTreeMap<Outcome, f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = observability::init_tracing("oracle_cli", cli.verbose);
    let prom = if cli.metrics {
        observability::init_metrics()
    } else {
        None
    };
    let cfg = config_loader::load_oracle_config(cli.config.as_deref())?;
    let mut engine = OracleEngine::new(cfg).context("build engine")?;

    match cli.command {
        Commands::Analyze(args) => {
            let outcomes = parse_sequence(&args.sequence).context("parse --sequence")?;
            replay(&mut engine, &outcomes);
            let report = AnalyzeReport {
                status: engine.status(),
                forecast: engine.predict_next(),
                big_road: engine.big_road_columns().to_vec(),
                trend: engine.road_trend(),
                module_accuracy: engine.module_accuracy(),
                live_module_accuracy: engine.live_module_accuracy(),
                outcome_accuracy: engine.outcome_accuracy(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Backtest(args) => {
            let outcomes = parse_sequence(&args.sequence).context("parse --sequence")?;
            for o in outcomes {
                engine.record(o);
            }
            let report: Vec<ModuleAccuracy> = engine.module_accuracy_report(args.lookback);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Session => run_session(&mut engine)?,
    }

    if let Some(handle) = prom {
        println!("{}", handle.render());
    }
    Ok(())
}

/// Feeds outcomes the way a live table would: forecast first, then the result.
fn replay(engine: &mut OracleEngine, outcomes: &[Outcome]) {
    for &o in outcomes {
        engine.predict_next();
        engine.record(o);
    }
}

fn run_session(engine: &mut OracleEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    writeln!(out, "{}", render_forecast(&engine.predict_next()))?;
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        let cmd = line.trim().to_ascii_lowercase();
        match cmd.as_str() {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "undo" | "u" => engine.remove_last(),
            "reset" => engine.reset(),
            "road" => {
                writeln!(out, "{}", render_road(engine.big_road_columns()))?;
                continue;
            }
            "acc" => {
                for (id, pct) in engine.module_accuracy() {
                    writeln!(out, "{id:<16} {pct:>6.1}%")?;
                }
                continue;
            }
            "status" => {
                writeln!(out, "{}", serde_json::to_string(&engine.status())?)?;
                continue;
            }
            other => {
                if let Err(err) = engine.record_symbol(other) {
                    writeln!(out, "error: {err}")?;
                    continue;
                }
            }
        }
        writeln!(out, "{}", render_forecast(&engine.predict_next()))?;
    }
    Ok(())
}

fn render_forecast(f: &Forecast) -> String {
    let head = match f.kind {
        ForecastKind::Prediction(o) => format!("next: {o} ({:.0}%)", f.confidence_pct()),
        ForecastKind::Unclear { leaning } => {
            format!("unclear, leaning {leaning} ({:.0}%)", f.confidence_pct())
        }
        ForecastKind::NoPattern => "no pattern".to_string(),
        ForecastKind::InsufficientHistory => "not enough history".to_string(),
        ForecastKind::Gated => format!("paused after {} misses", f.miss_streak),
    };
    let mut line = format!("{head} -> {}", f.recommendation);
    if !f.sources.is_empty() {
        let names: Vec<&str> = f.sources.iter().map(|s| s.as_str()).collect();
        line.push_str(&format!(" [{}]", names.join(", ")));
    }
    if let Some(p) = &f.pattern {
        line.push_str(&format!(" pattern={p}"));
    }
    if f.is_counter {
        line.push_str(" counter");
    }
    if f.recovery {
        line.push_str(" recovery");
    }
    if f.sniper {
        line.push_str(" sniper");
    }
    line
}

fn render_road(columns: &[RoadColumn]) -> String {
    columns
        .iter()
        .map(|col| {
            col.cells
                .iter()
                .map(|cell| match cell.ties {
                    0 => cell.outcome.to_string(),
                    n => format!("{}({n})", cell.outcome),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
