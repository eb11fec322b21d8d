//! Performance benchmarks for the simulation and protocol hot paths

use serde_json::Value;
use server::entity::Direction;
use server::game::GameState;
use server::projectile::{Projectile, ProjectileKind, BULLET_TTL};
use server::transaction::{Handler, TransactionEngine};
use shared::{decode, encode, keys, Cell, Message, TransactionKey};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

fn crowded_board() -> GameState {
    let mut game = GameState::new(30, 80, Duration::from_millis(83), Some(42));
    let glyphs = ['@', '#', '$', '%', '&', '*', 'A', 'B', 'C', 'D'];
    for (i, glyph) in glyphs.iter().enumerate() {
        game.add_player(&format!("p{}", i), *glyph, (i as i32 * 3) % 30, (i as i32 * 8) % 80);
    }
    game
}

/// Benchmarks simulation ticks on a busy board
#[test]
fn benchmark_tick_throughput() {
    let iterations = 1_000;
    let mut game = crowded_board();
    game.set_powerup_chance(0.5);

    let start = Instant::now();

    for tick in 0..iterations {
        // Keep roughly 200 projectiles in flight
        if tick % 5 == 0 {
            for i in 0..40 {
                let direction = [Direction::Up, Direction::Down, Direction::Left, Direction::Right][i % 4];
                game.projectiles.push(Projectile::new(
                    "p0",
                    (i as i32 * 7) % 30,
                    (i as i32 * 13) % 80,
                    direction,
                    BULLET_TTL,
                    ProjectileKind::Bullet,
                ));
            }
        }
        // Nobody dies in a benchmark
        for player in &mut game.players {
            player.health = 1_000_000;
        }
        game.update();
    }

    let duration = start.elapsed();
    println!(
        "Simulation: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A tick must fit comfortably inside the 83ms tick interval
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot construction
#[test]
fn benchmark_snapshot() {
    let iterations = 10_000;
    let mut game = crowded_board();
    for i in 0..100 {
        game.projectiles.push(Projectile::new(
            "p1",
            i % 30,
            i % 80,
            Direction::Right,
            BULLET_TTL,
            ProjectileKind::Bullet,
        ));
    }

    let start = Instant::now();
    let mut cells = 0;

    for _ in 0..iterations {
        cells += game.snapshot().cells.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(cells, iterations * 110);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks game_state frame encode and decode
#[test]
fn benchmark_frame_codec() {
    let iterations = 1_000;
    let mut health = BTreeMap::new();
    for i in 0..10 {
        health.insert(format!("p{}", i), 100 - i);
    }
    let message = Message::GameState {
        game_state: (0..200).map(|i| Cell(i % 30, i % 80, '·', 0)).collect(),
        players_health: health,
        status: "p3 was hit by a projectile!".to_string(),
        tid: TransactionKey::new(1, "server"),
    };

    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode(&message).unwrap();
        let decoded: Message = decode(&frame[4..]).unwrap();
        assert_eq!(decoded.kind(), "game_state");
    }

    let duration = start.elapsed();
    println!(
        "Frame codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}

/// Benchmarks routing keypress frames through the transaction engine
#[test]
fn benchmark_transaction_routing() {
    let iterations: u64 = 10_000;
    let mut game = crowded_board();
    game.set_powerup_chance(0.0);
    let mut engine = TransactionEngine::new();
    let now = Instant::now();

    let frames: Vec<Value> = (0..iterations)
        .map(|seq| {
            serde_json::to_value(Message::Keypress {
                key: keys::ALL[(seq % 8) as usize],
                tid: TransactionKey::new(seq, "p0"),
            })
            .unwrap()
        })
        .collect();

    let start = Instant::now();

    for frame in frames {
        let dispatch = engine.on_frame("p0", frame, &mut game, now).unwrap();
        assert!(dispatch.reply.is_some());
    }
    for _ in 0..1_000 {
        engine.begin("p0", Handler::Snapshot(game.snapshot()));
    }

    let duration = start.elapsed();
    println!(
        "Transactions: {} frames in {:?} ({:.2} μs/frame)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(engine.live_count(), 0);
    assert!(duration.as_millis() < 2000);
}
