//! # Regional Node Server
//!
//! The authoritative, headless server binary for one regional node.
//! Startup order: logging, configuration, chunk store, tick loop,
//! transport listener, cross-region sync — torn down in the reverse
//! order on shutdown signal.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use node::action::{Action, ActionHandler};
use node::config::{NodeConfig, PositionStorageConfig, PositionStorageKind};
use node::game_loop::{GameLoop, GameLoopConfig};
use node_sync::batch::{BatchConfig, BatchConsumer, BatchProducer};
use node_sync::eventbus::{EventBusClient, EventBusConfig, Message, NatsEventBus};
use node_sync::{ChangeKind, ChangeRecord, DurablePositionCache, InMemoryPositionCache, LastWriterWins, PositionCache};
use tokio::sync::mpsc;
use node_transport::{
    AuthResponse, ConnectionId, SessionConfig, SessionError, SessionManager, SnapshotBuilder, UdpTransport,
};
use node_world::{Block, ChunkStore, Layer, WorldSeed};
use oroboros_core::{EntityId, EntityKind, Position};

/// Maps a session's [`ConnectionId`] to the [`EntityId`] it controls.
///
/// The session layer only stores a bare entity index
/// (`ClientConnection::entity_id: u32`), which isn't enough to
/// reconstruct a live [`EntityId`] once that index's ECS slot has been
/// reused and its generation bumped. Keeping the real `EntityId` here,
/// set at admission time, avoids rebuilding it with a guessed generation.
type PlayerEntities = HashMap<ConnectionId, EntityId>;

/// Command-line overrides for a subset of [`NodeConfig`].
#[derive(Parser, Debug)]
#[command(name = "node_server", about = "Regional node server")]
struct Args {
    /// Path to a TOML configuration file. Falls back to built-in defaults
    /// plus environment overrides if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `sync.region_id`.
    #[arg(long)]
    region_id: Option<u32>,

    /// Overrides `server.udp_port`.
    #[arg(long)]
    udp_port: Option<u16>,

    /// Overrides `eventbus.url`.
    #[arg(long)]
    eventbus_url: Option<String>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .unwrap_or_else(|e| panic!("failed to read config file {}: {e}", path.display()));
            NodeConfig::from_toml_str(&source).unwrap_or_else(|e| panic!("invalid config file: {e}"))
        }
        None => NodeConfig::from_toml_str("").expect("default config is always valid toml"),
    };
    if let Some(region_id) = args.region_id {
        config.sync.region_id = region_id;
    }
    if let Some(udp_port) = args.udp_port {
        config.server.udp_port = udp_port;
    }
    if let Some(eventbus_url) = args.eventbus_url {
        config.eventbus.url = eventbus_url;
    }

    tracing::info!(region_id = config.sync.region_id, "starting regional node");

    let position_cache = build_position_cache(&config.position_storage);
    let mut store = ChunkStore::new(WorldSeed::new(u64::from(config.sync.region_id)));
    register_default_interactables(&mut store);
    let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, config.sync.region_id, position_cache);
    let action_handler = ActionHandler::new();

    let bind_address = config.server.udp_bind_address();
    let transport = match UdpTransport::bind(bind_address).await {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!(%bind_address, error = %e, "failed to bind UDP transport");
            std::process::exit(1);
        }
    };

    let mut session_manager = SessionManager::new(SessionConfig {
        tick_rate: node_transport::NODE_TICK_RATE,
        max_sessions: config.limits.max_sessions,
        port: config.server.udp_port,
        bind_address,
    });
    let io_event_tx = session_manager.event_sender();
    let io_command_rx = session_manager.command_receiver();
    tokio::spawn(transport.run_io_loop(io_event_tx, io_command_rx));

    let mut remote_rx = connect_sync_pipeline(&config, &mut game_loop).await.map(|(batch_producer, remote_rx)| {
        tokio::spawn(async move { batch_producer.run().await });
        remote_rx
    });
    let remote_consumer = BatchConsumer::new(LastWriterWins);

    let mut snapshot_builder = SnapshotBuilder::new();
    let mut player_entities: PlayerEntities = HashMap::new();
    let mut tick_interval =
        tokio::time::interval(std::time::Duration::from_micros(node_transport::TICK_DURATION_MICROS));
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());

    tracing::info!(%bind_address, "regional node listening");

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                apply_remote_batches(&mut game_loop, &remote_consumer, remote_rx.as_mut());
                run_one_tick(&mut game_loop, &mut session_manager, &action_handler, &mut snapshot_builder, &mut player_entities);
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    session_manager.shutdown();
}

/// Block id a door occupies while closed.
const DOOR_CLOSED: u32 = 100;
/// Block id the same door occupies while open.
const DOOR_OPEN: u32 = 101;

/// Registers the node's built-in interactable: a door that toggles
/// between [`DOOR_CLOSED`] and [`DOOR_OPEN`] on interact, demonstrating
/// the per-block-id `on_interact` dispatch (§4.1).
fn register_default_interactables(store: &mut ChunkStore) {
    store.register_block_id(DOOR_CLOSED);
    store.register_block_id(DOOR_OPEN);
    store.register_interactable(
        DOOR_CLOSED,
        Arc::new(|block, _actor_id| Block { id: DOOR_OPEN, metadata: block.metadata.clone() }),
    );
    store.register_interactable(
        DOOR_OPEN,
        Arc::new(|block, _actor_id| Block { id: DOOR_CLOSED, metadata: block.metadata.clone() }),
    );
}

/// Builds the position cache (§4.8) named by `config.position_storage`.
/// A durable cache that fails to open falls back to an in-memory one
/// when `fallback_to_memory` is set, rather than failing node startup.
fn build_position_cache(config: &PositionStorageConfig) -> Arc<dyn PositionCache> {
    match config.kind {
        PositionStorageKind::Memory => Arc::new(InMemoryPositionCache::new()),
        PositionStorageKind::Durable => {
            let Some(dsn) = config.dsn.as_ref() else {
                tracing::warn!("position_storage.kind is durable but no dsn is set, using in-memory cache");
                return Arc::new(InMemoryPositionCache::new());
            };
            match DurablePositionCache::open(dsn) {
                Ok(cache) => Arc::new(cache),
                Err(e) if config.fallback_to_memory => {
                    tracing::warn!(%dsn, error = %e, "durable position cache unavailable, falling back to in-memory");
                    Arc::new(InMemoryPositionCache::new())
                }
                Err(e) => panic!("failed to open durable position cache at {dsn}: {e}"),
            }
        }
    }
}

/// Attempts to connect the event-bus client and wire both halves of the
/// sync pipeline (§4.4) over it: a [`BatchProducer`] publishing this
/// region's local deltas, and a channel of inbound [`Message`]s from
/// every other region for the tick loop to resolve and apply. Sync is
/// best-effort: a node with no reachable event bus still serves local
/// sessions, just without cross-region replication, so failure here is
/// logged, not fatal.
async fn connect_sync_pipeline(
    config: &NodeConfig,
    game_loop: &mut GameLoop,
) -> Option<(BatchProducer, mpsc::Receiver<Message>)> {
    let bus_config = EventBusConfig {
        url: config.eventbus.url.clone(),
        stream: config.eventbus.stream.clone(),
        retention_hours: u64::from(config.eventbus.retention_hours),
        local_region_id: config.sync.region_id,
    };

    let bus = match NatsEventBus::connect(bus_config).await {
        Ok(bus) => bus,
        Err(e) => {
            tracing::warn!(error = %e, "event bus unreachable, running without cross-region sync");
            return None;
        }
    };

    let bus: Arc<dyn EventBusClient> = Arc::new(bus);
    let remote_rx = match bus.subscribe_from(0).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::warn!(error = %e, "failed to subscribe to remote regions, publishing without inbound sync");
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    };

    let producer = BatchProducer::new(
        game_loop.recorder(),
        bus,
        config.sync.region_id,
        BatchConfig {
            batch_size: config.sync.batch_size,
            flush_interval: config.sync.flush_interval(),
            gzip: config.sync.gzip,
        },
    );
    Some((producer, remote_rx))
}

/// Drains every remote-region [`Message`] buffered since the last tick,
/// resolves each decoded record against the chunk store's current state
/// (§4.5), and applies the ones the resolver accepts. A `None` receiver
/// (no event bus configured) makes this a no-op.
fn apply_remote_batches(
    game_loop: &mut GameLoop,
    consumer: &BatchConsumer<LastWriterWins>,
    remote_rx: Option<&mut mpsc::Receiver<Message>>,
) {
    let Some(remote_rx) = remote_rx else { return };
    let now = now_ms();

    while let Ok(message) = remote_rx.try_recv() {
        let store = game_loop.store_mut();
        let accepted = consumer.accept(&message.payload, |record| existing_change_for(store, record));
        match accepted {
            Ok(records) => {
                for record in records {
                    apply_remote_change(game_loop, &record.kind, now);
                }
            }
            Err(e) => {
                tracing::warn!(region_id = message.region_id, error = %e, "dropped undecodable remote batch");
            }
        }
    }
}

/// Builds the synthetic "currently stored" record the conflict resolver
/// compares an incoming remote record against. Only block mutations have
/// a comparable local counterpart (the chunk's own last-modified time);
/// entity records are always accepted since the chunk store tracks their
/// position, not a history of prior writes to compare against.
fn existing_change_for(store: &mut ChunkStore, record: &ChangeRecord) -> Option<ChangeRecord> {
    match &record.kind {
        ChangeKind::BlockSet { x, y, layer, .. } | ChangeKind::BlockDelete { x, y, layer } => {
            let layer = Layer::from_u8(*layer)?;
            let (block, last_modified_ms) = store.get_block_with_timestamp(layer, *x, *y);
            Some(ChangeRecord {
                sequence: 0,
                region_id: record.region_id,
                timestamp_ms: last_modified_ms,
                kind: ChangeKind::BlockSet { x: *x, y: *y, layer: layer as u8, block_id: block.id as u16 },
            })
        }
        ChangeKind::EntitySpawn { .. }
        | ChangeKind::EntityDespawn { .. }
        | ChangeKind::EntityMove { .. }
        | ChangeKind::EntityAttr { .. } => None,
    }
}

/// Commits one accepted remote [`ChangeKind`] to local state. Remote
/// entities are tracked only in the chunk store's spatial index (§4.1),
/// not simulated locally; `EntityAttr` has no chunk-store counterpart
/// and is a no-op here.
fn apply_remote_change(game_loop: &mut GameLoop, kind: &ChangeKind, now_ms: u64) {
    let store = game_loop.store_mut();
    match *kind {
        ChangeKind::BlockSet { x, y, layer, block_id } => {
            if let Some(layer) = Layer::from_u8(layer) {
                let _ = store.set_block(layer, x, y, Block::new(u32::from(block_id)), now_ms);
            }
        }
        ChangeKind::BlockDelete { x, y, layer } => {
            if let Some(layer) = Layer::from_u8(layer) {
                let _ = store.set_block(layer, x, y, Block::air(), now_ms);
            }
        }
        ChangeKind::EntitySpawn { entity_id, x, y, .. } | ChangeKind::EntityMove { entity_id, x, y } => {
            store.upsert_entity_position(entity_id, x, y);
        }
        ChangeKind::EntityDespawn { entity_id } => {
            store.remove_entity(entity_id);
        }
        ChangeKind::EntityAttr { .. } => {}
    }
}

/// One tick: admit/reap sessions, resolve client inputs into player
/// moves and actions, run the game loop's tick order, broadcast the
/// resulting snapshot.
fn run_one_tick(
    game_loop: &mut GameLoop,
    session_manager: &mut SessionManager,
    action_handler: &ActionHandler,
    snapshot_builder: &mut SnapshotBuilder,
    player_entities: &mut PlayerEntities,
) {
    let now = now_ms();
    let (ready_inputs, pending_auth) = session_manager.drain_events();

    for (addr, _request) in pending_auth {
        admit_player(game_loop, addr, session_manager, player_entities);
    }

    let mut player_moves = Vec::with_capacity(ready_inputs.len());
    for (connection_id, input) in &ready_inputs {
        let Some(&entity_id) = player_entities.get(connection_id) else {
            continue;
        };
        let move_x = f32::from(input.move_x) / f32::from(i8::MAX);
        let move_y = f32::from(input.move_y) / f32::from(i8::MAX);
        if move_x != 0.0 || move_y != 0.0 {
            player_moves.push((entity_id, (move_x, move_y)));
        }
        if let Some(connection) = session_manager.table_mut().get_mut(*connection_id) {
            connection.mark_input_applied(input.input_sequence);
        }

        // EntityAction packets carry the richer per-action payload
        // (target entity, block coordinates, metadata); ClientInput's
        // bare `action` byte only round-trips actions with no payload.
        match input.requested_action() {
            Some(node_transport::ActionKind::Respawn) => {
                let (world, store) = game_loop.world_and_store_mut();
                let _ = action_handler.handle(world, store, entity_id, now, Action::Respawn);
            }
            Some(node_transport::ActionKind::Emote) => {
                let (world, store) = game_loop.world_and_store_mut();
                let _ = action_handler.handle(
                    world,
                    store,
                    entity_id,
                    now,
                    Action::Emote { metadata: Vec::new() },
                );
            }
            _ => {}
        }
    }

    let reaped = session_manager.reap_idle_sessions();
    for connection_id in reaped {
        snapshot_builder.forget(connection_id.0);
        player_entities.remove(&connection_id);
    }

    game_loop.tick(now, &player_moves);

    if session_manager.session_count() > 0 {
        let ack_sequences: HashMap<u32, u32> = player_entities
            .iter()
            .filter_map(|(connection_id, entity_id)| {
                session_manager.table().get(*connection_id).map(|c| (entity_id.index(), c.ack_sequence()))
            })
            .collect();
        let entities = collect_entity_states(game_loop, &ack_sequences);
        let block_updates = Vec::new();
        let snapshot = snapshot_builder.build(game_loop.tick_count() as u32, &entities, &block_updates);
        session_manager.broadcast_snapshot(&snapshot);
    }

    session_manager.advance_tick();
}

fn collect_entity_states(game_loop: &mut GameLoop, ack_sequences: &HashMap<u32, u32>) -> Vec<node_transport::EntityState> {
    let world = game_loop.world_mut();
    world
        .iter_alive()
        .map(|entity| {
            let index = entity.id.index() as usize;
            let position = world.positions.get(index).copied().unwrap_or_default();
            let facing = world.facings.get(index).copied().unwrap_or_default();
            node_transport::EntityState {
                entity_id: entity.id.index(),
                layer: Layer::Active as u8,
                facing: facing.direction,
                health: 0,
                pos_x: (position.x * 256.0) as i32,
                pos_y: (position.y * 256.0) as i32,
                ack_input_sequence: ack_sequences.get(&entity.id.index()).copied().unwrap_or(0),
                flags: node_transport::EntityState::FLAG_ALIVE,
                _padding: [0; 3],
            }
        })
        .collect()
}

/// Completes the `AuthRequest`/`AuthResponse` handshake (§6): spawns a
/// player entity, admits the session, and replies with the outcome.
/// A rejected admission despawns the entity it provisionally spawned
/// rather than leaking it into the world.
fn admit_player(
    game_loop: &mut GameLoop,
    addr: SocketAddr,
    session_manager: &mut SessionManager,
    player_entities: &mut PlayerEntities,
) {
    let entity_id = game_loop.world_mut().spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
    let tick = game_loop.tick_count() as u32;
    match session_manager.admit(addr, entity_id.index()) {
        Ok(connection_id) => {
            player_entities.insert(connection_id, entity_id);
            session_manager.reply_auth(
                addr,
                AuthResponse { player_id: entity_id.index(), capabilities: 0, result: 0, _padding: [0; 3], tick },
            );
        }
        Err(e) => {
            tracing::warn!(%addr, error = %e, "session admission rejected");
            game_loop.world_mut().despawn(entity_id);
            session_manager.reply_auth(
                addr,
                AuthResponse {
                    player_id: 0,
                    capabilities: 0,
                    result: session_error_code(e),
                    _padding: [0; 3],
                    tick,
                },
            );
        }
    }
}

/// Maps a [`SessionError`] to the wire result code carried by
/// `AuthResponse.result` (0 is reserved for "accepted").
const fn session_error_code(error: SessionError) -> u8 {
    match error {
        SessionError::TableFull => 1,
        SessionError::PerAddressLimitExceeded => 2,
    }
}
