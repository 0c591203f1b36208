//! Many clients, many workers, many ticks: every snapshot reference must be
//! accounted for and every snapshot freed exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use fanout_core::{EntityState, SnapshotFrame, SnapshotStore, TempEntity};
use fanout_networking::{
    BroadcastConfig, BroadcastOrchestrator, ClientId, ClientSession, ParallelBroadcaster,
    RecordingTransport, SoundEvent,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CLIENTS: u32 = 48;
const TICKS: u32 = 300;
const HISTORY: usize = 8;

fn frame(tick: u32, rng: &mut StdRng) -> SnapshotFrame {
    let entities = (0..64)
        .map(|id| EntityState {
            health: rng.gen_range(0..4),
            origin: [i32::try_from(tick).unwrap_or(0), 0, 0],
            ..EntityState::new(id, 1)
        })
        .collect();
    let temp_entities = (0..rng.gen_range(0..3u16))
        .map(|class| TempEntity::new(class, vec![0u8; 4]).unwrap())
        .collect();
    SnapshotFrame {
        entities,
        temp_entities,
        ..SnapshotFrame::default()
    }
}

#[test]
fn test_parallel_broadcast_refcounts() {
    let config = BroadcastConfig {
        worker_threads: 8,
        history_window: HISTORY,
        ..BroadcastConfig::default()
    };
    let store = SnapshotStore::new(config.history_window);
    let broadcaster = ParallelBroadcaster::new(Arc::new(BroadcastOrchestrator::new(
        Arc::clone(&store),
        config.clone(),
    )));

    let sessions: Vec<Mutex<ClientSession>> = (0..CLIENTS)
        .map(|i| {
            let session = if i % 6 == 0 {
                ClientSession::bot(ClientId(i), format!("bot{i}"), &config)
            } else {
                ClientSession::new(
                    ClientId(i),
                    format!("client{i}"),
                    Box::new(RecordingTransport::new()),
                    &config,
                )
            };
            Mutex::new(session)
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(0x5EED);
    let start = Instant::now();
    let mut sent = 0;

    for tick in 1..=TICKS {
        for session in &sessions {
            let mut session = session.lock();
            for _ in 0..rng.gen_range(0..5u16) {
                session.push_sound(SoundEvent::new(1, rng.gen()));
            }
        }

        let report = broadcaster
            .run_tick(tick, frame(tick, &mut rng), &sessions)
            .unwrap();
        assert_eq!(report.total(), sessions.len());
        assert_eq!(report.disconnected, 0);
        sent += report.sent();

        // Clients acknowledge with random lag; some lose their baseline
        for session in &sessions {
            let mut session = session.lock();
            if session.is_bot() {
                continue;
            }
            match rng.gen_range(0..10) {
                0 => session.request_full_update(),
                1..=6 => {
                    if let Some(last) = session.last_sent_tick() {
                        session.acknowledge(last);
                    }
                }
                _ => {}
            }
        }

        // Every live snapshot: history slot + sessions pointing at it
        let mut held: HashMap<u32, u32> = HashMap::new();
        for session in &sessions {
            if let Some(last) = session.lock().last_sent_tick() {
                *held.entry(last).or_default() += 1;
            }
        }
        let oldest_in_history = tick.saturating_sub(HISTORY as u32 - 1).max(1);
        for t in 1..=tick {
            let expected = u32::from(t >= oldest_in_history) + held.get(&t).copied().unwrap_or(0);
            if expected == 0 {
                assert!(!store.is_live(t), "tick {t} should have been freed");
            } else {
                assert_eq!(store.ref_count_at(t), Some(expected), "tick {t}");
            }
        }
    }

    let elapsed = start.elapsed();
    println!("\n=== Parallel Broadcast ===");
    println!("Clients: {CLIENTS}, ticks: {TICKS}, packets: {sent}, time: {elapsed:?}");

    drop(sessions);
    store.clear_history();
    let stats = store.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.created, u64::from(TICKS));
    assert_eq!(stats.freed, stats.created);
}

#[test]
fn test_store_shared_by_many_broadcasters() {
    let config = BroadcastConfig {
        worker_threads: 4,
        ..BroadcastConfig::default()
    };
    let store = SnapshotStore::new(4);

    // Two independent groups on one store, broadcast from two threads
    let groups: Vec<Vec<Mutex<ClientSession>>> = (0..2u32)
        .map(|g| {
            (0..16u32)
                .map(|i| {
                    Mutex::new(ClientSession::new(
                        ClientId(g * 100 + i),
                        format!("g{g}c{i}"),
                        Box::new(RecordingTransport::new()),
                        &config,
                    ))
                })
                .collect()
        })
        .collect();
    let broadcaster = ParallelBroadcaster::new(Arc::new(BroadcastOrchestrator::new(
        Arc::clone(&store),
        config,
    )));

    for tick in 1..=50 {
        let snapshot = store
            .publish(tick, SnapshotFrame::with_entities(vec![EntityState::new(tick, 1)]))
            .unwrap();
        std::thread::scope(|s| {
            for group in &groups {
                let broadcaster = &broadcaster;
                let snapshot = &snapshot;
                s.spawn(move || {
                    let report = broadcaster.broadcast(group, snapshot);
                    assert_eq!(report.total(), group.len());
                });
            }
        });
        for group in &groups {
            for session in group {
                let mut session = session.lock();
                if let Some(last) = session.last_sent_tick() {
                    session.acknowledge(last);
                }
            }
        }
        // Caller + history + every session
        assert_eq!(store.ref_count(&snapshot), 2 + 32);
    }

    drop(groups);
    store.clear_history();
    assert_eq!(store.stats().live, 0);
}
