use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use card_session::config::{EngineConfig, DEFAULT_BENCH_CAPACITY, DEFAULT_PRIZE_COUNT};
use card_session::engine::{
    validate_documents, ErrorCode, PerPlayer, PlayerId, RequestStatus, SessionId,
};
use card_session::session::{DeckCard, OwnerView, SessionEngine, SubmitCommand, SubmitOutcome};
use card_session::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "bin::session_demo";
const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "session_demo")]
#[command(about = "Run two clients against one in-memory card session", long_about = None)]
struct Args {
    /// Session identifier to create
    #[arg(long, env = "DEMO_SESSION_ID", default_value = "demo-table")]
    session_id: String,

    /// Cards seeded into each player's deck
    #[arg(long, env = "DEMO_DECK_SIZE", default_value_t = 20)]
    deck_size: usize,

    /// Operations each client submits
    #[arg(long, env = "DEMO_ROUNDS", default_value_t = 6)]
    rounds: usize,

    /// Bench slots per player
    #[arg(long, env = "DEMO_BENCH_CAPACITY", default_value_t = DEFAULT_BENCH_CAPACITY)]
    bench_capacity: usize,

    /// Optional RNG seed for reproducible shuffles and coin flips
    #[arg(long, env = "DEMO_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "DEMO_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;

    let config = EngineConfig {
        bench_capacity: args.bench_capacity,
        default_prize_count: DEFAULT_PRIZE_COUNT,
        rng_seed: args.rng_seed,
    };
    let engine = Arc::new(SessionEngine::in_memory(config));
    let id = SessionId::new(args.session_id.clone());
    set_up_table(&engine, &id, args.deck_size).await?;

    let clients = PlayerId::ALL.map(|player| {
        let engine = Arc::clone(&engine);
        let id = id.clone();
        let rounds = args.rounds;
        spawn_named_task(format!("client-{player}"), async move {
            run_client(engine, id, player, rounds).await
        })
    });
    for client in clients {
        client.await.context("client task panicked")??;
    }

    report(&engine, &id).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn uid(player: PlayerId) -> String {
    format!("demo-{player}")
}

async fn set_up_table(engine: &SessionEngine, id: &SessionId, deck_size: usize) -> Result<()> {
    engine.create_session(id.clone()).await?;
    for player in PlayerId::ALL {
        engine.claim_slot(id, player, &uid(player)).await?;
        let cards = (1..=deck_size)
            .map(|n| DeckCard {
                original_card_code: format!("DEMO-{n:03}"),
                image_url: format!("https://cards.example/demo/{n}.png"),
            })
            .collect();
        let seeded = engine.seed_deck(id, player, &uid(player), cards).await?;
        info!(
            target = LOG_TARGET,
            player = %player,
            cards = seeded.output.len(),
            revision = seeded.revision,
            "deck seeded"
        );
    }
    Ok(())
}

/// Picks the next operation from the latest snapshot.
fn next_operation(
    player: PlayerId,
    round: usize,
    view: &OwnerView,
) -> (&'static str, Value) {
    let pending = view
        .session
        .public_state
        .operation_requests
        .iter()
        .find(|r| r.status == RequestStatus::Pending && r.target_player_id == player);
    if let Some(request) = pending {
        return (
            "REQUEST_APPROVE",
            json!({"requestId": request.request_id, "action": "approve"}),
        );
    }
    let hand = view.session.counters(player).hand_count;
    match round % 4 {
        0 => ("B01", json!({"count": 2})),
        1 if player == PlayerId::Player1 => ("I01", json!({"targetPlayerId": player.other()})),
        1 => ("A01", json!({})),
        2 if hand > 0 => ("D01", json!({"count": 1})),
        2 => ("A02", json!({})),
        _ => ("H01", json!({})),
    }
}

async fn run_client(
    engine: Arc<SessionEngine>,
    id: SessionId,
    player: PlayerId,
    rounds: usize,
) -> Result<()> {
    let uid = uid(player);
    for round in 0..rounds {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let view = engine.snapshot(&id, player, &uid).await?;
            let (op, payload) = next_operation(player, round, &view);
            let command = SubmitCommand {
                session_id: id.clone(),
                player_id: player,
                actor_uid: uid.clone(),
                op_id: op.to_owned(),
                payload,
                expected_revision: Some(view.session.revision),
            };
            match engine.submit(command).await {
                Ok(SubmitOutcome::Applied(receipt)) => {
                    info!(
                        target = LOG_TARGET,
                        player = %player,
                        op,
                        revision = receipt.revision,
                        effect = %serde_json::to_string(&receipt.effect)?,
                        "applied"
                    );
                    break;
                }
                Ok(SubmitOutcome::Rejected(rejection)) => {
                    warn!(
                        target = LOG_TARGET,
                        player = %player,
                        op,
                        code = %rejection.code,
                        reason = %rejection.message,
                        "rejected"
                    );
                    break;
                }
                Err(err) if err.code() == ErrorCode::RevisionConflict && attempt < MAX_ATTEMPTS => {
                    info!(
                        target = LOG_TARGET,
                        player = %player,
                        op,
                        attempt,
                        hint = err.user_hint(),
                        "conflict; refreshing"
                    );
                    tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                }
                Err(err) => return Err(anyhow!("{player} failed on {op}: {err}")),
            }
        }
        tokio::task::yield_now().await;
    }
    Ok(())
}

async fn report(engine: &SessionEngine, id: &SessionId) -> Result<()> {
    let mut privates = PerPlayer::default();
    let mut session = None;
    for player in PlayerId::ALL {
        let view = engine.snapshot(id, player, &uid(player)).await?;
        *privates.get_mut(player) = view.private_state;
        session = Some(view.session);
    }
    let session = session.context("no snapshot was read")?;

    let violations = validate_documents(&session, &privates);
    if !violations.is_empty() {
        return Err(anyhow!("documents are inconsistent: {violations:?}"));
    }
    info!(
        target = LOG_TARGET,
        revision = session.revision,
        turn = session.public_state.turn_context.turn_number,
        requests = session.public_state.operation_requests.len(),
        "session consistent"
    );
    println!("{}", serde_json::to_string_pretty(&session.public_state)?);
    Ok(())
}
