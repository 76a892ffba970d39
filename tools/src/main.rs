//! day-runner: headless driver for the business day emulator.
//!
//! Usage:
//!   day-runner --seed 12345 --steps 600 --speed rapid
//!   day-runner --data-dir ./data --live
//!   day-runner --seed 12345 --ipc-mode

use anyhow::Result;
use chrono::{TimeZone, Utc};
use dayclock_core::{
    clock::{ManualWallClock, SimSpeed, SystemWallClock, WallClock},
    command::ClockCommand,
    config::EmulationConfig,
    event::DayEvent,
    metrics::MetricsBundle,
    rng::JitterBank,
    shared::SharedEmulator,
    snapshot::ClockView,
    ticker::Ticker,
    BusinessDayEmulator,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick { count: u64 },
    Command { cmd: ClockCommand },
    Quit,
}

#[derive(serde::Serialize)]
struct UiState<'a> {
    clock:   ClockView,
    metrics: &'a MetricsBundle,
    events:  Vec<&'static str>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let steps = parse_arg(&args, "--steps", 600u64);
    let live = args.iter().any(|a| a == "--live");
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let speed = args
        .windows(2)
        .find(|w| w[0] == "--speed")
        .map(|w| w[1].parse::<SimSpeed>().map_err(anyhow::Error::msg))
        .transpose()?;
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str());

    let config = match data_dir {
        Some(dir) => EmulationConfig::load(dir)?,
        None => EmulationConfig::default(),
    };

    if !ipc_mode {
        println!("FMI business day emulator — day-runner");
        println!("  seed:      {seed}");
        println!("  steps:     {steps}");
        println!("  speed:     {}x", speed.map_or(config.acceleration_factor, |s| s.factor()));
        println!("  data_dir:  {}", data_dir.unwrap_or("(built-in)"));
        println!("  mode:      {}", if live { "live" } else { "batch" });
        println!();
    }

    if live {
        return run_live(config, speed, steps);
    }

    let wall = Arc::new(ManualWallClock::new(Utc.timestamp_opt(0, 0).single().unwrap_or_default()));
    let interval_ms = i64::try_from(config.tick_interval_ms).unwrap_or(i64::MAX);
    let mut emulator = BusinessDayEmulator::new(config, wall.clone(), Box::new(JitterBank::new(seed)))?;
    if let Some(speed) = speed {
        emulator.set_speed(speed);
    }

    if ipc_mode {
        run_ipc_loop(&mut emulator, &wall, interval_ms)?;
    } else {
        emulator.start();
        for _ in 0..steps {
            wall.advance_millis(interval_ms);
            for event in emulator.tick(wall.now()) {
                print_event(&event);
            }
        }
        print_summary(&emulator, steps);
    }
    Ok(())
}

/// Real wall clock, background ticker, bundle printed as it is published.
fn run_live(config: EmulationConfig, speed: Option<SimSpeed>, steps: u64) -> Result<()> {
    let interval = Duration::from_millis(config.tick_interval_ms);
    let shared = SharedEmulator::new(BusinessDayEmulator::new(
        config,
        Arc::new(SystemWallClock),
        Box::new(JitterBank::from_entropy()),
    )?);
    let subscription = shared.subscribe()?;

    if let Some(speed) = speed {
        shared.apply(ClockCommand::SetSpeed { speed })?;
    }
    shared.apply(ClockCommand::Start)?;
    let mut ticker = Ticker::spawn(shared.clone(), interval)?;

    let mut published = 0;
    for event in subscription.receiver.iter() {
        print_event(&event);
        if matches!(event, DayEvent::MetricsPublished { .. }) {
            published += 1;
            if published >= steps {
                break;
            }
        }
    }
    ticker.stop()?;
    Ok(())
}

fn run_ipc_loop(emulator: &mut BusinessDayEmulator, wall: &ManualWallClock, interval_ms: i64) -> Result<()> {
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

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let events = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => vec![],
            IpcCommand::Tick { count } => {
                let mut events = vec![];
                for _ in 0..count {
                    wall.advance_millis(interval_ms);
                    events.extend(emulator.tick(wall.now()));
                }
                events
            }
            IpcCommand::Command { cmd } => emulator.apply(cmd),
        };

        let state = UiState {
            clock:   emulator.clock_view(),
            metrics: emulator.metrics(),
            events:  events.iter().map(DayEvent::type_name).collect(),
        };
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_event(event: &DayEvent) {
    match event {
        DayEvent::PhaseChanged { emulated_time, from, to } => {
            println!("  {emulated_time}  {from} -> {to}");
        }
        DayEvent::DayRolledOver { date } => println!("  === new emulated day {date} ==="),
        DayEvent::DayClamped { emulated_time } => println!("  {emulated_time}  day clamped"),
        DayEvent::MetricsPublished { bundle } => log::debug!(
            "{} {} {:.1}% tpm={:.1} queued={}",
            bundle.emulated_time,
            bundle.phase,
            bundle.progress_percent,
            bundle.transactions_per_minute,
            bundle.queued_payments
        ),
        other => log::debug!("{}", other.type_name()),
    }
}

fn print_summary(emulator: &BusinessDayEmulator, steps: u64) {
    let view = emulator.clock_view();
    let m = emulator.metrics();

    println!();
    println!("=== RUN SUMMARY ===");
    println!("  steps run:        {steps}");
    println!("  emulated time:    {}", view.emulated_time);
    println!("  phase:            {} ({}, {:.1}%)", view.current_phase.name, view.current_phase.window_label(), view.progress_percent);
    println!("  running:          {}", view.is_running);

    println!();
    println!("=== METRICS ===");
    println!("  txns/minute:      {:.1}", m.transactions_per_minute);
    println!("  total txns:       {}", m.total_transactions);
    println!("  avg value (m):    {:.2}", m.average_transaction_value);
    println!("  settled (m):      {:.0}", m.settlement_value);
    println!("  queued:           {}", m.queued_payments);
    println!("  liquidity used:   {:.1}%", m.liquidity_utilization_percent);
    println!("  liquidity free:   {:.0}", m.available_liquidity);
    println!("  settlement rate:  {:.1}%", m.settlement_rate_percent);

    println!();
    println!("=== PHASES ===");
    for phase in emulator.get_phases() {
        let marker = if phase.name == view.current_phase.name { ">" } else { " " };
        println!("  {marker} {}  {}", phase.window_label(), phase.name);
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
