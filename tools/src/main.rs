//! swarm-runner: headless front end for the swarm simulation.
//!
//! Usage:
//!   swarm-runner --seed 12345 --ticks 600 --out sim_log.jsonl
//!   swarm-runner --config swarm.json --ipc-mode
//!
//! Headless mode runs the live engine for N ticks and writes every
//! snapshot as one JSON line (a recorded log). IPC mode reads one JSON
//! command per stdin line and answers with one JSON line on stdout.

use anyhow::Result;
use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use swarm_core::{
    arbiter::ModeArbiter,
    command::{Command, CommandReply},
    config::SimConfig,
    engine::SimEngine,
    error::SimError,
    ingest,
    rng,
    snapshot::Snapshot,
    vessel::Status,
};

/// Runner-only commands; everything else is handed to the arbiter.
#[derive(serde::Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum RunnerCommand {
    LoadLog { path: String },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let ticks = parse_arg(&args, "--ticks", 600u64);
    let out = string_arg(&args, "--out");

    let mut config = match string_arg(&args, "--config") {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = opt_arg(&args, "--seed") {
        config.seed = Some(seed);
    }

    if ipc_mode {
        let arbiter = ModeArbiter::new(config)?;
        return run_ipc_loop(&arbiter);
    }

    let seed = config.seed.unwrap_or_else(rng::fresh_seed);
    println!("Swarm simulation — swarm-runner");
    println!("  seed:        {seed}");
    println!("  ticks:       {ticks}");
    println!("  friendlies:  {}", config.fleet.friendly_count);
    println!("  adversaries: {}", config.fleet.adversary_count);
    println!("  out:         {}", out.unwrap_or("(none)"));
    println!();

    let mut engine = SimEngine::build(seed, config)?;
    let mut writer = match out {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let mut event_count = 0usize;
    if let Some(w) = writer.as_mut() {
        write_snapshots(w, &engine.snapshots())?;
    }
    for _ in 0..ticks {
        let output = engine.tick();
        event_count += output.events.len();
        for event in &output.events {
            log::debug!("{event}");
        }
        if let Some(w) = writer.as_mut() {
            write_snapshots(w, &output.snapshots)?;
        }
    }
    if let Some(w) = writer.as_mut() {
        w.flush()?;
    }

    print_summary(&engine, ticks, event_count);
    Ok(())
}

fn write_snapshots<W: Write>(w: &mut W, snapshots: &[Snapshot]) -> Result<()> {
    for s in snapshots {
        writeln!(w, "{}", serde_json::to_string(s)?)?;
    }
    Ok(())
}

fn run_ipc_loop(arbiter: &ModeArbiter) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<RunnerCommand>(&buffer) {
            Ok(RunnerCommand::Quit) => break,
            Ok(RunnerCommand::LoadLog { path }) => match ingest::read_log_file(&path) {
                Ok(log) => arbiter.execute(Command::StartPlayback { log }),
                Err(e) => CommandReply::failure(&e),
            },
            Err(_) => match serde_json::from_str::<Command>(&buffer) {
                Ok(cmd) => arbiter.execute(cmd),
                Err(e) => CommandReply::failure(&SimError::Serialization(e)),
            },
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }

    arbiter.stop()?;
    Ok(())
}

fn print_summary(engine: &SimEngine, ticks: u64, event_count: usize) {
    let snapshots = engine.snapshots();
    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut batteries = Vec::new();
    for s in &snapshots {
        if let (Some(status), Some(battery)) = (s.status(), s.battery_pct()) {
            *by_status.entry(status.as_str()).or_default() += 1;
            batteries.push(battery);
        }
    }
    let mean_battery = if batteries.is_empty() {
        0.0
    } else {
        batteries.iter().sum::<f64>() / batteries.len() as f64
    };

    println!("=== RUN SUMMARY ===");
    println!("  seed:         {}", engine.seed());
    println!("  ticks run:    {ticks}");
    println!("  final time:   {}", engine.clock.now().to_rfc3339());
    println!("  events:       {event_count}");
    println!("  mean battery: {mean_battery:.1}%");
    for status in [Status::Idle, Status::Tracking, Status::Error] {
        let n = by_status.get(status.as_str()).copied().unwrap_or(0);
        println!("  {:<13} {n}", format!("{}:", status.as_str().to_lowercase()));
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    opt_arg(args, flag).unwrap_or(default)
}

fn opt_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    string_arg(args, flag).and_then(|v| v.parse().ok())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
