//! Ping/echo workload: a small network model driven by the kernel.
//!
//! Node 0 pings nodes `1..n` round-robin at a fixed interval. Each hop is
//! delivered under the receiving node's context after a base latency plus
//! seeded random jitter, and may be dropped. Every ping arms a [`Timer`];
//! an echo cancels it, otherwise it fires and the ping counts as lost.
//! A destroy event records pings still outstanding at teardown.
//!
//! All randomness comes from one `StdRng` seeded from the config, so two
//! runs with the same config produce identical traces.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::Context;
use crate::simulation::Simulator;
use crate::time::Time;
use crate::timer::Timer;

// ── Config ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// Total node count, including the pinger (node 0).
    pub nodes: u32,
    /// Number of pings node 0 sends.
    pub pings: u32,
    /// Gap between consecutive pings.
    pub interval: Time,
    /// Fixed one-way latency.
    pub latency: Time,
    /// Maximum extra one-way delay; actual jitter is uniform in `[0, jitter]`.
    pub jitter: Time,
    /// Probability that a single hop is dropped, in `[0.0, 1.0]`.
    pub drop_probability: f64,
    /// How long node 0 waits for an echo.
    pub timeout: Time,
    pub seed: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            nodes: 3,
            pings: 10,
            interval: Time::from_millis(1),
            latency: Time::from_micros(100),
            jitter: Time::ZERO,
            drop_probability: 0.0,
            timeout: Time::from_millis(10),
            seed: 42,
        }
    }
}

// ── Trace ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceKind {
    PingSent { seq: u32, to: Context },
    PingReceived { seq: u32, from: Context },
    EchoReceived { seq: u32, from: Context, rtt: Time },
    Dropped { seq: u32, to: Context },
    Timeout { seq: u32 },
    Outstanding { seq: u32 },
}

/// One observable step of the workload, attributed to the node whose
/// context it ran under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub time: Time,
    pub node: Context,
    #[serde(flatten)]
    pub kind: TraceKind,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {:?}", self.time, self.node, self.kind)
    }
}

// ── Report ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PingReport {
    pub sent: u64,
    /// Pings that reached an echo node.
    pub delivered: u64,
    /// Echoes that made it back before the timeout.
    pub answered: u64,
    pub dropped: u64,
    pub timed_out: u64,
    /// Pings still waiting when the kernel was destroyed.
    pub outstanding: u64,
    pub min_rtt: Option<Time>,
    pub max_rtt: Option<Time>,
    pub mean_rtt: Option<Time>,
    #[serde(skip)]
    pub trace: Vec<TraceEntry>,
}

// ── World ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct World {
    config: PingConfig,
    rng: StdRng,
    /// Pending pings: seq -> (sent at, timeout timer).
    in_flight: BTreeMap<u32, (Time, Timer)>,
    rtts: Vec<Time>,
    report: PingReport,
}

impl World {
    fn record(&mut self, time: Time, node: Context, kind: TraceKind) {
        trace!(%time, %node, ?kind, "ping trace");
        self.report.trace.push(TraceEntry { time, node, kind });
    }

    /// One-way delay for the next hop, or `None` if the hop is dropped.
    fn hop_delay(&mut self) -> Option<Time> {
        if self.config.drop_probability > 0.0
            && self.rng.gen_bool(self.config.drop_probability.min(1.0))
        {
            return None;
        }
        let jitter = if self.config.jitter.is_positive() {
            Time::from_nanos(self.rng.gen_range(0..=self.config.jitter.ticks()))
        } else {
            Time::ZERO
        };
        Some(self.config.latency + jitter)
    }
}

type Shared = Rc<RefCell<World>>;

const PINGER: Context = Context::new(0);

// ── Scenario ──────────────────────────────────────────────────────────

/// The ping/echo workload. Build it, [`install`](PingScenario::install)
/// it on a kernel, run the kernel, then read the [`report`](PingScenario::report).
#[derive(Debug, Clone)]
pub struct PingScenario {
    world: Shared,
}

impl PingScenario {
    pub fn new(config: PingConfig) -> Self {
        let world = World {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            in_flight: BTreeMap::new(),
            rtts: Vec::new(),
            report: PingReport::default(),
        };
        PingScenario {
            world: Rc::new(RefCell::new(world)),
        }
    }

    /// Schedule every ping on `sim` and register the teardown hook.
    pub fn install(&self, sim: &mut Simulator) {
        let config = self.world.borrow().config.clone();
        debug!(nodes = config.nodes, pings = config.pings, "installing ping scenario");

        for seq in 0..config.pings {
            let to = target(&config, seq);
            let world = self.world.clone();
            sim.schedule_with_context(PINGER, config.interval * i64::from(seq), move |sim| {
                send_ping(sim, &world, seq, to)
            });
        }

        let world = self.world.clone();
        sim.schedule_destroy(move |sim| {
            let mut w = world.borrow_mut();
            let outstanding: Vec<u32> = w.in_flight.keys().copied().collect();
            for seq in outstanding {
                w.report.outstanding += 1;
                w.record(sim.now(), PINGER, TraceKind::Outstanding { seq });
            }
            w.in_flight.clear();
        });
    }

    /// Counters and trace so far.
    pub fn report(&self) -> PingReport {
        let w = self.world.borrow();
        let mut report = w.report.clone();
        report.min_rtt = w.rtts.iter().min().copied();
        report.max_rtt = w.rtts.iter().max().copied();
        if !w.rtts.is_empty() {
            let total: i64 = w.rtts.iter().map(|t| t.ticks()).sum();
            report.mean_rtt = Some(Time::from_nanos(total / w.rtts.len() as i64));
        }
        report
    }
}

/// Echo node for ping `seq`: round-robin over `1..nodes`, or node 0
/// itself when it is alone.
fn target(config: &PingConfig, seq: u32) -> Context {
    if config.nodes > 1 {
        Context::new(1 + seq % (config.nodes - 1))
    } else {
        PINGER
    }
}

fn send_ping(sim: &mut Simulator, world: &Shared, seq: u32, to: Context) {
    let now = sim.now();
    let mut w = world.borrow_mut();
    w.report.sent += 1;
    w.record(now, sim.context(), TraceKind::PingSent { seq, to });

    let mut timer = Timer::new(w.config.timeout);
    let on_timeout = world.clone();
    timer.arm(sim, move |sim| ping_timed_out(sim, &on_timeout, seq));
    w.in_flight.insert(seq, (now, timer));

    match w.hop_delay() {
        Some(delay) => {
            let on_arrival = world.clone();
            sim.schedule_with_context(to, delay, move |sim| {
                ping_received(sim, &on_arrival, seq, PINGER)
            });
        }
        None => {
            w.report.dropped += 1;
            w.record(now, sim.context(), TraceKind::Dropped { seq, to });
        }
    }
}

fn ping_received(sim: &mut Simulator, world: &Shared, seq: u32, from: Context) {
    let here = sim.context();
    let mut w = world.borrow_mut();
    w.report.delivered += 1;
    w.record(sim.now(), here, TraceKind::PingReceived { seq, from });

    match w.hop_delay() {
        Some(delay) => {
            let on_arrival = world.clone();
            sim.schedule_with_context(from, delay, move |sim| {
                echo_received(sim, &on_arrival, seq, here)
            });
        }
        None => {
            w.report.dropped += 1;
            w.record(sim.now(), here, TraceKind::Dropped { seq, to: from });
        }
    }
}

fn echo_received(sim: &mut Simulator, world: &Shared, seq: u32, from: Context) {
    let mut w = world.borrow_mut();
    // A late echo finds its ping already timed out and removed.
    let Some((sent_at, mut timer)) = w.in_flight.remove(&seq) else {
        return;
    };
    timer.cancel(sim);

    let rtt = sim.now() - sent_at;
    w.rtts.push(rtt);
    w.report.answered += 1;
    w.record(sim.now(), sim.context(), TraceKind::EchoReceived { seq, from, rtt });
}

fn ping_timed_out(sim: &mut Simulator, world: &Shared, seq: u32) {
    let mut w = world.borrow_mut();
    if w.in_flight.remove(&seq).is_some() {
        w.report.timed_out += 1;
        w.record(sim.now(), sim.context(), TraceKind::Timeout { seq });
    }
}
