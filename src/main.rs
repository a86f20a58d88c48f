//! netsim CLI
//!
//! Runs the ping/echo workload on a fresh kernel and prints what happened.

use clap::Parser;
use netsim::{PingConfig, PingScenario, QueueKind, SimConfig, Simulator, Time};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Deterministic discrete-event network simulation
#[derive(Parser, Debug)]
#[command(name = "netsim")]
#[command(about = "Run a deterministic ping/echo network simulation", long_about = None)]
struct Args {
    /// Seed for latency jitter and packet loss
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of nodes, including the pinger
    #[arg(short, long, default_value = "3")]
    nodes: u32,

    /// Number of pings to send
    #[arg(short, long, default_value = "10")]
    pings: u32,

    /// Gap between pings (e.g. 1ms, 250us)
    #[arg(long, default_value = "1ms", value_parser = non_negative_time)]
    interval: Time,

    /// One-way link latency
    #[arg(long, default_value = "100us", value_parser = non_negative_time)]
    latency: Time,

    /// Maximum extra one-way delay
    #[arg(long, default_value = "0ns", value_parser = non_negative_time)]
    jitter: Time,

    /// How long the pinger waits for an echo
    #[arg(long, default_value = "10ms", value_parser = non_negative_time)]
    timeout: Time,

    /// Probability that a single hop is dropped
    #[arg(long, default_value = "0.0")]
    drop: f64,

    /// Stop the simulation at this virtual time
    #[arg(long, value_parser = non_negative_time)]
    stop_at: Option<Time>,

    /// Event queue implementation (heap, map, list)
    #[arg(short, long, default_value = "heap")]
    queue: QueueKind,

    /// Stop after dispatching this many events
    #[arg(long)]
    max_events: Option<u64>,

    /// Print every trace entry
    #[arg(long)]
    trace: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,
}

/// Durations handed to the kernel as delays must not be negative.
fn non_negative_time(s: &str) -> Result<Time, String> {
    let time: Time = s.parse().map_err(|e: netsim::SimError| e.to_string())?;
    if time.is_negative() {
        return Err(format!("{time} is negative"));
    }
    Ok(time)
}

fn main() {
    let args = Args::parse();

    // RUST_LOG wins over --verbose when set.
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !(0.0..=1.0).contains(&args.drop) {
        error!("--drop must be between 0.0 and 1.0, got {}", args.drop);
        std::process::exit(2);
    }

    let sim_config = SimConfig {
        queue: args.queue,
        max_events: args.max_events,
        stop_at: args.stop_at,
    };
    let ping_config = PingConfig {
        nodes: args.nodes,
        pings: args.pings,
        interval: args.interval,
        latency: args.latency,
        jitter: args.jitter,
        drop_probability: args.drop,
        timeout: args.timeout,
        seed: args.seed,
    };

    if !args.json {
        info!("netsim v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "{} nodes, {} pings every {}, latency {} (+{} jitter), queue={}",
            ping_config.nodes,
            ping_config.pings,
            ping_config.interval,
            ping_config.latency,
            ping_config.jitter,
            sim_config.queue
        );
    }

    let mut sim = Simulator::with_config(sim_config.clone());
    let scenario = PingScenario::new(ping_config.clone());
    scenario.install(&mut sim);
    sim.run();
    let summary = sim.summary();
    sim.destroy();
    let report = scenario.report();

    if args.json {
        let mut output = serde_json::json!({
            "config": { "sim": sim_config, "ping": ping_config },
            "summary": summary,
            "report": report,
        });
        if args.trace {
            output["trace"] = serde_json::json!(report.trace);
        }
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if args.trace {
        for entry in &report.trace {
            info!("  {entry}");
        }
    }

    let fmt_rtt = |rtt: Option<Time>| rtt.map_or_else(|| "-".to_string(), |t| t.to_string());
    info!(
        "Run finished at {} after {} events ({} still pending)",
        summary.now, summary.events_processed, summary.pending
    );
    info!(
        "Pings: {} sent, {} delivered, {} answered, {} dropped, {} timed out, {} outstanding",
        report.sent,
        report.delivered,
        report.answered,
        report.dropped,
        report.timed_out,
        report.outstanding
    );
    info!(
        "RTT: min {} / mean {} / max {}",
        fmt_rtt(report.min_rtt),
        fmt_rtt(report.mean_rtt),
        fmt_rtt(report.max_rtt)
    );
}
