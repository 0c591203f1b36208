//! # Broadcast Stress Run
//!
//! Drives the parallel broadcaster through a long run of ticks with lagging
//! acks, lost baselines, sound bursts and bots, then checks that every
//! snapshot the store created was freed exactly once.
//!
//! ## Usage
//!
//! ```bash
//! broadcast_stress --clients 256 --ticks 2000 --workers 8 --bots 32
//! broadcast_stress --config broadcast.toml
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use fanout_core::{EntityState, SnapshotFrame, SnapshotStore, TempEntity};
use fanout_networking::{
    BroadcastConfig, BroadcastOrchestrator, ClientId, ClientSession, LoopbackTransport,
    ParallelBroadcaster, SoundEvent, TickReport,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Options {
    clients: u32,
    bots: u32,
    ticks: u32,
    entities: u32,
    workers: Option<usize>,
    seed: u64,
    config_path: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            clients: 128,
            bots: 16,
            ticks: 1000,
            entities: 256,
            workers: None,
            seed: 0xF4_0F,
            config_path: None,
        }
    }
}

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         FANOUT BROADCAST STRESS                                  ║");
    println!("║         EVERY CLIENT, EVERY TICK, EVERY REFERENCE                ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" | "-c" => {
                if i + 1 < args.len() {
                    opts.clients = args[i + 1].parse().unwrap_or(128);
                    i += 1;
                }
            }
            "--bots" | "-b" => {
                if i + 1 < args.len() {
                    opts.bots = args[i + 1].parse().unwrap_or(16);
                    i += 1;
                }
            }
            "--ticks" | "-t" => {
                if i + 1 < args.len() {
                    opts.ticks = args[i + 1].parse().unwrap_or(1000);
                    i += 1;
                }
            }
            "--entities" | "-e" => {
                if i + 1 < args.len() {
                    opts.entities = args[i + 1].parse().unwrap_or(256);
                    i += 1;
                }
            }
            "--workers" | "-w" => {
                if i + 1 < args.len() {
                    opts.workers = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--seed" | "-s" => {
                if i + 1 < args.len() {
                    opts.seed = args[i + 1].parse().unwrap_or(0xF4_0F);
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    opts.config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: broadcast_stress [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --clients <NUM>     Connected clients (default: 128)");
                println!("  -b, --bots <NUM>        Bots (default: 16)");
                println!("  -t, --ticks <NUM>       Ticks to run (default: 1000)");
                println!("  -e, --entities <NUM>    Entities per snapshot (default: 256)");
                println!("  -w, --workers <NUM>     Worker threads (default: from config)");
                println!("  -s, --seed <NUM>        RNG seed");
                println!("      --config <PATH>     Broadcast config TOML");
                println!("  -h, --help              Show this help");
                return ExitCode::SUCCESS;
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = match &opts.config_path {
        Some(path) => match BroadcastConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => BroadcastConfig::default(),
    };
    if let Some(workers) = opts.workers {
        config.worker_threads = workers;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {e}");
        return ExitCode::FAILURE;
    }

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Clients:            {}", opts.clients);
    println!("│ Bots:               {}", opts.bots);
    println!("│ Ticks:              {}", opts.ticks);
    println!("│ Entities:           {}", opts.entities);
    println!("│ Workers:            {}", config.worker_threads);
    println!("│ History Window:     {}", config.history_window);
    println!("│ Scratch Capacity:   {} bytes", config.scratch_capacity);
    println!("│ Sound Policy:       {:?}", config.sound_policy);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let store = SnapshotStore::new(config.history_window);
    let broadcaster = ParallelBroadcaster::new(Arc::new(BroadcastOrchestrator::new(
        Arc::clone(&store),
        config.clone(),
    )));

    let sessions = build_sessions(&opts, &config);
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let mut totals = TickReport::default();
    let mut worst_tick_us = 0u128;

    let start = Instant::now();
    for tick in 1..=opts.ticks {
        queue_sounds(&sessions, &mut rng);

        let tick_start = Instant::now();
        let report = match broadcaster.run_tick(tick, world(tick, opts.entities, &mut rng), &sessions) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("Tick {tick} failed: {e}");
                return ExitCode::FAILURE;
            }
        };
        worst_tick_us = worst_tick_us.max(tick_start.elapsed().as_micros());
        accumulate(&mut totals, &report);

        acknowledge(&sessions, &mut rng);

        if opts.ticks >= 10 && tick % (opts.ticks / 10) == 0 {
            println!(
                "  tick {tick:>6}: full {:>4} delta {:>5} dropped {:>3} disconnected {:>3}",
                report.full, report.delta, report.dropped, report.disconnected
            );
        }
    }
    let elapsed = start.elapsed();

    let still_active = sessions.iter().filter(|s| s.lock().is_active()).count();
    drop(sessions);
    store.clear_history();
    let stats = store.stats();

    println!();
    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    println!("│ Elapsed:            {elapsed:.2?}");
    println!(
        "│ Avg Tick:           {:.1} us",
        elapsed.as_secs_f64() * 1_000_000.0 / f64::from(opts.ticks.max(1))
    );
    println!("│ Worst Tick:         {worst_tick_us} us");
    println!("│ Full Updates:       {}", totals.full);
    println!("│ Delta Updates:      {}", totals.delta);
    println!("│ Keepalives:         {}", totals.keepalive);
    println!("│ Dropped Deltas:     {}", totals.dropped);
    println!("│ Bot (local only):   {}", totals.local);
    println!("│ Disconnected:       {}", totals.disconnected);
    println!("│ Skipped:            {}", totals.skipped);
    println!("│ Bytes Sent:         {}", totals.bytes);
    println!("│ Sessions Active:    {still_active}");
    println!("├─ STORE ─────────────────────────────────────────────────────────┤");
    println!("│ Created:            {}", stats.created);
    println!("│ Freed:              {}", stats.freed);
    println!("│ Live:               {}", stats.live);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if stats.live != 0 || stats.freed != stats.created {
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║  FAILED: snapshot references leaked                              ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        return ExitCode::FAILURE;
    }

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║  PASSED: every snapshot freed exactly once                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    ExitCode::SUCCESS
}

fn build_sessions(opts: &Options, config: &BroadcastConfig) -> Vec<Mutex<ClientSession>> {
    let clients = (0..opts.clients).map(|i| {
        ClientSession::new(
            ClientId(i),
            format!("client{i}"),
            Box::new(LoopbackTransport::new()),
            config,
        )
    });
    let bots = (0..opts.bots).map(|i| {
        let id = opts.clients + i;
        ClientSession::bot(ClientId(id), format!("bot{i}"), config)
    });
    clients.chain(bots).map(Mutex::new).collect()
}

fn world(tick: u32, entities: u32, rng: &mut StdRng) -> SnapshotFrame {
    let entities = (0..entities)
        .map(|id| {
            let mut state = EntityState::new(id, u16::try_from(id % 8).unwrap_or(0));
            // Roughly a quarter of the world moves each tick
            if rng.gen_range(0..4) == 0 {
                state.origin = [i32::try_from(tick).unwrap_or(i32::MAX), 0, 0];
            }
            state
        })
        .collect();
    let temp_entities = (0..rng.gen_range(0..4u16))
        .filter_map(|class| TempEntity::new(class, vec![0u8; 8]).ok())
        .collect();
    SnapshotFrame {
        entities,
        temp_entities,
        ..SnapshotFrame::default()
    }
}

fn queue_sounds(sessions: &[Mutex<ClientSession>], rng: &mut StdRng) {
    for session in sessions {
        let mut session = session.lock();
        if !session.is_active() {
            continue;
        }
        // Occasional bursts above the per-packet cap
        let count = if rng.gen_range(0..50) == 0 { 40 } else { rng.gen_range(0..4) };
        for _ in 0..count {
            session.push_sound(SoundEvent::new(rng.gen_range(0..512), rng.gen()));
        }
    }
}

fn acknowledge(sessions: &[Mutex<ClientSession>], rng: &mut StdRng) {
    for session in sessions {
        let mut session = session.lock();
        if session.is_bot() || !session.is_active() {
            continue;
        }
        match rng.gen_range(0..100) {
            0..=1 => session.request_full_update(),
            2..=79 => {
                if let Some(last) = session.last_sent_tick() {
                    session.acknowledge(last);
                }
            }
            // Lagging ack: stays on its current baseline
            _ => {}
        }
    }
}

fn accumulate(totals: &mut TickReport, report: &TickReport) {
    totals.tick = report.tick;
    totals.full += report.full;
    totals.delta += report.delta;
    totals.keepalive += report.keepalive;
    totals.dropped += report.dropped;
    totals.local += report.local;
    totals.disconnected += report.disconnected;
    totals.skipped += report.skipped;
    totals.bytes += report.bytes;
}
