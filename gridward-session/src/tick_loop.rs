use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use gridward_connection::{ConnectionState, Event as ConnectionEvent, Request as ConnectionRequest};
use gridward_protocol::packet::SpatialEntry;
use gridward_protocol::{shutdown_reason, ClientPacket, ServerPacket};
use gridward_shared::{cancel, Config, ConnectionId, ConnectionIdAllocator, Direction, PlayerId, PlayerIdAllocator};
use gridward_stream_codec::StreamCodec;
use gridward_world::{MoveResult, Player, PlayerRegistry, World};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::action::{Action, BotSpawnPattern, ConsoleCommand};
use crate::hooks::{NullScriptHook, PersistenceSink, ScriptHook};
use crate::metrics::Metrics;

const NEW_CONNECTION_BUFFER_SIZE: usize = 64;
const CONSOLE_BUFFER_SIZE: usize = 16;
/// Bot placeholder connection ids start here, far above any realistic count of real connections,
/// so they never collide with ids a real accept loop hands out starting at 1.
const BOT_CONNECTION_ID_BASE: u64 = 1 << 32;

/// A freshly accepted connection, handed to the tick loop by whatever owns the listener (see
/// `gridward_dedicated`). Carries the connection actor's cancel guard so the tick loop becomes
/// the sole owner of its lifetime: once `connections` drops the entry, the actor is torn down.
pub struct NewConnection {
    pub conn_id: ConnectionId,
    pub guard: cancel::Guard,
    pub requests: mpsc::Sender<ConnectionRequest>,
    pub events: mpsc::Receiver<ConnectionEvent>,
}

struct ConnHandle {
    #[allow(dead_code)]
    guard: cancel::Guard,
    requests: mpsc::Sender<ConnectionRequest>,
    events: mpsc::Receiver<ConnectionEvent>,
    player_id: Option<PlayerId>,
}

enum LoopEvent {
    Cancelled,
    NewConnection(Option<NewConnection>),
    Console(Option<ConsoleCommand>),
    Connection(ConnectionId, Option<ConnectionEvent>),
    Tick,
}

/// The single task that owns all mutable game state: the world, the player registry, and the
/// queue of pending gameplay actions. Every other task talks to it only through channels.
pub struct TickLoop {
    cancel_token: cancel::Token,
    config: Config,
    world: World,
    registry: PlayerRegistry,
    player_ids: PlayerIdAllocator,
    bot_conn_ids: ConnectionIdAllocator,
    bot_ids: Vec<PlayerId>,
    connections: HashMap<ConnectionId, ConnHandle>,
    new_connections: mpsc::Receiver<NewConnection>,
    console_commands: mpsc::Receiver<ConsoleCommand>,
    action_queue: VecDeque<Action>,
    script_hook: Box<dyn ScriptHook>,
    persistence: Box<dyn PersistenceSink>,
    metrics: Arc<Metrics>,
}

pub struct TickLoopHandle {
    pub cancel_guard: cancel::Guard,
    pub new_connections: mpsc::Sender<NewConnection>,
    pub console_commands: mpsc::Sender<ConsoleCommand>,
    pub metrics: Arc<Metrics>,
}

impl TickLoop {
    pub fn spawn(
        config: Config,
        script_hook: Box<dyn ScriptHook>,
        persistence: Box<dyn PersistenceSink>,
    ) -> TickLoopHandle {
        let cancel_token = cancel::Token::new();
        let (new_conn_tx, new_conn_rx) = mpsc::channel(NEW_CONNECTION_BUFFER_SIZE);
        let (console_tx, console_rx) = mpsc::channel(CONSOLE_BUFFER_SIZE);
        let metrics = Metrics::new();

        let tick_loop = Self {
            cancel_token: cancel_token.clone(),
            world: World::new(&config),
            registry: PlayerRegistry::new(),
            player_ids: PlayerIdAllocator::new(),
            bot_conn_ids: ConnectionIdAllocator::starting_at(BOT_CONNECTION_ID_BASE),
            bot_ids: Vec::new(),
            connections: HashMap::new(),
            new_connections: new_conn_rx,
            console_commands: console_rx,
            action_queue: VecDeque::new(),
            script_hook,
            persistence,
            metrics: metrics.clone(),
            config,
        };
        tokio::spawn(tick_loop.run());

        TickLoopHandle {
            cancel_guard: cancel_token.guard(),
            new_connections: new_conn_tx,
            console_commands: console_tx,
            metrics,
        }
    }

    async fn run(mut self) {
        let mut tick_interval = interval(self.config.tick_interval());

        while !self.cancel_token.is_cancelled() {
            let mut dynamic_events: FuturesUnordered<_> = self
                .connections
                .iter_mut()
                .map(|(&conn_id, handle)| async move { (conn_id, handle.events.recv().await) })
                .collect();

            let event = tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => LoopEvent::Cancelled,

                new_conn = self.new_connections.recv() => LoopEvent::NewConnection(new_conn),

                cmd = self.console_commands.recv() => LoopEvent::Console(cmd),

                Some((conn_id, event)) = dynamic_events.next() => LoopEvent::Connection(conn_id, event),

                _ = tick_interval.tick() => LoopEvent::Tick,
            };
            drop(dynamic_events);

            match event {
                LoopEvent::Cancelled => break,
                LoopEvent::NewConnection(Some(new_conn)) => self.handle_new_connection(new_conn),
                LoopEvent::NewConnection(None) => {}
                LoopEvent::Console(Some(cmd)) => self.apply_console_command(cmd).await,
                LoopEvent::Console(None) => {}
                LoopEvent::Connection(conn_id, Some(event)) => {
                    self.handle_connection_event(conn_id, event).await
                }
                LoopEvent::Connection(conn_id, None) => self.handle_connection_closed(conn_id).await,
                LoopEvent::Tick => self.handle_tick().await,
            }
        }

        for (conn_id, handle) in self.connections.drain() {
            let _ = handle.requests.send(ConnectionRequest::Close).await;
            log::debug!("connection {conn_id}: closed for shutdown");
        }
    }

    fn handle_new_connection(&mut self, new_conn: NewConnection) {
        self.connections.insert(
            new_conn.conn_id,
            ConnHandle {
                guard: new_conn.guard,
                requests: new_conn.requests,
                events: new_conn.events,
                player_id: None,
            },
        );
    }

    async fn handle_connection_event(&mut self, conn_id: ConnectionId, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(ConnectionState::Active) => {
                self.spawn_player(conn_id).await
            }
            ConnectionEvent::StateChanged(_) => {}
            ConnectionEvent::Packet(packet) => self.handle_client_packet(conn_id, packet).await,
            ConnectionEvent::Closed => self.handle_connection_closed(conn_id).await,
        }
    }

    async fn handle_client_packet(&mut self, conn_id: ConnectionId, packet: ClientPacket) {
        let Some(player_id) = self.connections.get(&conn_id).and_then(|h| h.player_id) else {
            log::debug!("connection {conn_id}: dropping packet received before spawn");
            return;
        };
        let action = match packet {
            ClientPacket::ClientHello { .. } => {
                log::debug!("connection {conn_id}: dropping redundant handshake packet");
                return;
            }
            ClientPacket::Move { dir, facing } => Action::Move {
                player_id,
                dir,
                facing,
            },
            ClientPacket::Turn { facing } => Action::Turn { player_id, facing },
            ClientPacket::Interact => Action::Interact { player_id },
            ClientPacket::Attack => Action::Attack { player_id },
        };
        self.enqueue_action(conn_id, action).await;
    }

    /// Pushes `action` onto the tick queue. Producers never block the tick task: if the queue is
    /// already at capacity, the connection that produced the overflowing action is closed with
    /// `Overloaded` rather than stalling or silently dropping gameplay input.
    async fn enqueue_action(&mut self, conn_id: ConnectionId, action: Action) {
        let max_queued = self.config.max_actions_per_tick * 4;
        if self.action_queue.len() >= max_queued {
            self.metrics.record_action_dropped();
            log::warn!(
                "connection {conn_id}: action queue at capacity ({max_queued}), closing as overloaded"
            );
            self.close_connection(conn_id, shutdown_reason::OVERLOADED).await;
            return;
        }
        self.action_queue.push_back(action);
    }

    /// Sends `reason` as a `ServerShutdown` and tells the connection actor to close, without
    /// blocking the tick task on either send.
    async fn close_connection(&mut self, conn_id: ConnectionId, reason: u8) {
        self.send_to(conn_id, ServerPacket::ServerShutdown { reason }).await;
        if let Some(handle) = self.connections.get(&conn_id) {
            let _ = handle.requests.try_send(ConnectionRequest::Close);
        }
    }

    async fn handle_connection_closed(&mut self, conn_id: ConnectionId) {
        if let Some(handle) = self.connections.remove(&conn_id) {
            if let Some(player_id) = handle.player_id {
                self.despawn_player(player_id).await;
            }
        }
    }

    async fn spawn_player(&mut self, conn_id: ConnectionId) {
        if self.connections.get(&conn_id).and_then(|h| h.player_id).is_some() {
            return;
        }
        let Some((x, y)) = self.find_free_point(conn_id.0) else {
            log::warn!("connection {conn_id}: no free spawn point, rejecting connection");
            self.close_connection(conn_id, shutdown_reason::NO_FREE_SPAWN_POINT).await;
            return;
        };

        let player_id = self.player_ids.allocate();
        if let Err(e) = self.world.add_player(player_id, x as i32, y as i32) {
            log::error!("connection {conn_id}: failed to register player {player_id} in world: {e}");
            return;
        }
        let player = Player::new(
            player_id,
            conn_id,
            x,
            y,
            Direction::North,
            self.config.move_cooldown,
        );
        self.registry.insert(player);
        if let Some(handle) = self.connections.get_mut(&conn_id) {
            handle.player_id = Some(player_id);
        }
        self.script_hook.on_player_joined(&player_id.0.to_string());
        self.metrics.set_players_connected(self.registry.len() as u64);

        self.send_to(
            conn_id,
            ServerPacket::Welcome {
                id: player_id,
                x,
                y,
                facing: Direction::North,
            },
        )
        .await;

        let visible = self
            .world
            .players_in_range(x as i32, y as i32, self.config.view_range, Some(player_id));
        let entries: Vec<SpatialEntry> = visible
            .iter()
            .filter_map(|&other_id| {
                self.registry.get(other_id).map(|other| SpatialEntry {
                    id: other_id,
                    x: other.x,
                    y: other.y,
                    facing: other.facing,
                })
            })
            .collect();
        self.send_batch_spatial(conn_id, &entries).await;
        log::info!("connection {conn_id}: spawned as {player_id} at ({x}, {y})");
    }

    async fn despawn_player(&mut self, player_id: PlayerId) {
        if let Some(player) = self.registry.get(player_id) {
            self.persistence.save_player_position(player_id, player.x, player.y);
            self.persistence.save_player_stats(player_id);
        }
        self.bot_ids.retain(|&id| id != player_id);
        self.registry.remove(player_id);
        let observers = self.world.remove_player(player_id);
        self.metrics.set_players_connected(self.registry.len() as u64);

        for observer_id in observers {
            if let Some(observer) = self.registry.get(observer_id) {
                let conn_id = observer.conn_id;
                self.send_to(conn_id, ServerPacket::PlayerLeft { id: player_id }).await;
            }
        }
        log::info!("{player_id} left the world");
    }

    async fn handle_tick(&mut self) {
        let start = Instant::now();
        let to_apply = self.config.max_actions_per_tick.min(self.action_queue.len());
        let mut moved: HashSet<PlayerId> = HashSet::new();

        for _ in 0..to_apply {
            let Some(action) = self.action_queue.pop_front() else {
                break;
            };
            self.apply_action(action, &mut moved).await;
            self.metrics.record_action_applied();
        }

        // Players to refresh this tick: movers themselves, anyone near a mover's new position
        // (who may have just entered view), and anyone who already observed a mover (who may have
        // just fallen out of view and needs a PlayerLeft — a move only touches the mover's
        // neighborhood in `players_in_range`, never the neighborhood it left).
        let mut to_refresh: HashSet<PlayerId> = HashSet::new();
        for &player_id in &moved {
            to_refresh.insert(player_id);
            if let Some(observers) = self.world.visibility().known_by(player_id) {
                to_refresh.extend(observers.iter().copied());
            }
            if let Some(player) = self.registry.get(player_id) {
                let nearby = self.world.players_in_range(
                    player.x as i32,
                    player.y as i32,
                    self.config.view_range,
                    None,
                );
                to_refresh.extend(nearby);
            }
        }
        for player_id in to_refresh {
            self.refresh_visibility(player_id).await;
        }

        self.metrics.record_tick(start.elapsed().as_nanos() as u64);
    }

    async fn apply_action(&mut self, action: Action, moved: &mut HashSet<PlayerId>) {
        match action {
            Action::Move {
                player_id,
                dir,
                facing,
            } => self.apply_move(player_id, dir, facing, moved).await,
            Action::Turn { player_id, facing } => self.apply_turn(player_id, facing).await,
            Action::Interact { player_id } => self.script_hook.on_interact(&player_id.0.to_string()),
            Action::Attack { player_id } => self.script_hook.on_attack(&player_id.0.to_string()),
            Action::Console(cmd) => self.apply_console_command(cmd).await,
        }
    }

    async fn apply_move(
        &mut self,
        player_id: PlayerId,
        dir: Direction,
        facing: Direction,
        moved: &mut HashSet<PlayerId>,
    ) {
        let world = &self.world;
        let outcome = match self.registry.get_mut(player_id) {
            Some(player) => {
                let result = player.attempt_move(
                    dir,
                    facing,
                    world.map(),
                    |x, y, exclude_id| world.is_occupied(x, y, Some(exclude_id)),
                    Instant::now(),
                );
                Some((result, player.x, player.y, player.facing, player.conn_id))
            }
            None => None,
        };
        let Some((result, x, y, facing, conn_id)) = outcome else {
            return;
        };
        if result == MoveResult::Success {
            self.world.update_player_position(player_id, x as i32, y as i32);
            self.registry.mark_dirty(player_id);
            moved.insert(player_id);
            self.script_hook
                .on_player_moved(&player_id.0.to_string(), x, y, facing);
            self.send_to(conn_id, ServerPacket::PositionCorrection { x, y, facing }).await;
        }
    }

    async fn apply_turn(&mut self, player_id: PlayerId, facing: Direction) {
        let conn_id = match self.registry.get_mut(player_id) {
            Some(player) => {
                player.turn(facing);
                player.conn_id
            }
            None => return,
        };
        self.send_to(conn_id, ServerPacket::FacingCorrection { facing }).await;
    }

    async fn refresh_visibility(&mut self, player_id: PlayerId) {
        let Some((x, y, conn_id)) = self
            .registry
            .get(player_id)
            .map(|player| (player.x, player.y, player.conn_id))
        else {
            return;
        };
        let diff = self.world.update_visibility(player_id, x as i32, y as i32);
        if diff.entered.is_empty() && diff.left.is_empty() {
            return;
        }

        let entries: Vec<SpatialEntry> = diff
            .entered
            .iter()
            .filter_map(|&other_id| {
                self.registry.get(other_id).map(|other| SpatialEntry {
                    id: other_id,
                    x: other.x,
                    y: other.y,
                    facing: other.facing,
                })
            })
            .collect();
        self.send_batch_spatial(conn_id, &entries).await;

        for left_id in diff.left {
            self.send_to(conn_id, ServerPacket::PlayerLeft { id: left_id }).await;
        }
    }

    async fn send_batch_spatial(&mut self, conn_id: ConnectionId, entries: &[SpatialEntry]) {
        for chunk in entries.chunks(self.config.max_batch_entries.max(1)) {
            self.send_to(
                conn_id,
                ServerPacket::BatchSpatial {
                    entries: chunk.to_vec(),
                },
            )
            .await;
        }
    }

    /// Hands `packet` to the connection actor's outbound queue. Uses `try_send` rather than an
    /// awaited send: the tick task serves every connection from one loop, so it must never block
    /// on a single slow peer. A full outbound queue closes that connection as overloaded instead.
    async fn send_to(&mut self, conn_id: ConnectionId, packet: ServerPacket) {
        let Some(handle) = self.connections.get(&conn_id) else {
            return;
        };
        let mut payload = Vec::new();
        packet.write_to(&mut payload).unwrap();
        let payload_len = payload.len() as u64;
        match handle.requests.try_send(ConnectionRequest::Send(packet)) {
            Ok(()) => self.metrics.record_bytes_sent(payload_len),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!(
                    "connection {conn_id}: outbound queue full, closing connection as overloaded"
                );
                let _ = handle.requests.try_send(ConnectionRequest::Close);
            }
        }
    }

    async fn apply_console_command(&mut self, cmd: ConsoleCommand) {
        match cmd {
            ConsoleCommand::Stop => self.cancel_token.cancel(),
            ConsoleCommand::ReloadScripts => {
                self.script_hook = Box::new(NullScriptHook);
                log::info!("script hook reloaded");
            }
            ConsoleCommand::Stats => {
                let snapshot = self.metrics.snapshot();
                log::info!("{snapshot:?}");
            }
            ConsoleCommand::SpawnBots { count, pattern } => self.spawn_bots(count, pattern).await,
            ConsoleCommand::RemoveBots => self.remove_bots().await,
        }
    }

    async fn spawn_bots(&mut self, count: usize, pattern: BotSpawnPattern) {
        let mut spawned = 0usize;
        for i in 0..count {
            let (x, y) = self.bot_spawn_point(i, pattern);
            if self.world.is_occupied(x as i32, y as i32, None) {
                continue;
            }
            let player_id = self.player_ids.allocate();
            let conn_id = self.bot_conn_ids.allocate();
            if self.world.add_player(player_id, x as i32, y as i32).is_err() {
                continue;
            }
            let mut player = Player::new(
                player_id,
                conn_id,
                x,
                y,
                Direction::North,
                self.config.move_cooldown,
            );
            player.is_bot = true;
            self.registry.insert(player);
            self.bot_ids.push(player_id);
            spawned += 1;
        }
        self.metrics.set_players_connected(self.registry.len() as u64);
        log::info!("spawned {spawned}/{count} bots ({pattern:?})");
    }

    async fn remove_bots(&mut self) {
        let bot_ids = std::mem::take(&mut self.bot_ids);
        let removed = bot_ids.len();
        for player_id in bot_ids {
            self.despawn_player(player_id).await;
        }
        log::info!("removed {removed} bots");
    }

    fn bot_spawn_point(&self, index: usize, pattern: BotSpawnPattern) -> (i16, i16) {
        let map = self.world.map();
        let width = map.width().max(1);
        let height = map.height().max(1);
        match pattern {
            BotSpawnPattern::Spread => {
                let x = (index * 7) as i32 % width;
                let y = (index * 13) as i32 % height;
                (x as i16, y as i16)
            }
            BotSpawnPattern::Clustered => {
                let cx = width / 2;
                let cy = height / 2;
                let dx = (index % 5) as i32 - 2;
                let dy = (index / 5 % 5) as i32 - 2;
                (
                    (cx + dx).clamp(0, width - 1) as i16,
                    (cy + dy).clamp(0, height - 1) as i16,
                )
            }
        }
    }

    /// Bounded linear probe outward from the map center for an unoccupied, unblocked tile.
    /// `seed` spreads distinct callers (connections, bots) across different starting offsets.
    fn find_free_point(&self, seed: u64) -> Option<(i16, i16)> {
        let map = self.world.map();
        let width = map.width().max(1);
        let height = map.height().max(1);
        let cx = width / 2;
        let cy = height / 2;
        for attempt in 0..64i64 {
            let step = seed as i64 + attempt;
            let x = (cx as i64 + (step * 7) % width as i64).rem_euclid(width as i64) as i32;
            let y = (cy as i64 + (step * 13) % height as i64).rem_euclid(height as i64) as i32;
            if !map.is_blocked(x, y) && !self.world.is_occupied(x, y, None) {
                return Some((x as i16, y as i16));
            }
        }
        None
    }
}
