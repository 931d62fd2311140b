use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::coordinator::{Coordinator, TurnPhase};
use crate::env::Settings;
use crate::errors::{ClientError, ClientResult};
use crate::legality::{self, ActionKind, PlayCheck};
use crate::planner::Planner;
use crate::protocol::{ClientCommand, ServerReply};
use crate::snapshot::SnapshotCache;
use crate::transport::{ConnectionState, Requester, Transport};
use crate::types::{GameSnapshot, LobbyConfig, Seat, TurnPlan};

/// Everything the presentation layer talks to.
///
/// Read accessors are synchronous and cheap; action methods go through the
/// legality engine or the coordinator. The UI never constructs card instances
/// or commit records itself, it only queues actions by card id.
pub struct GameClient {
    transport: Transport,
    cache: SnapshotCache,
    planner: Arc<Mutex<Planner>>,
    coordinator: Arc<Coordinator>,
    node_id: String,
    watcher: JoinHandle<()>,
}

impl GameClient {
    /// Connect to the configured server, wait until the socket is open and
    /// pull a first snapshot.
    pub async fn connect(settings: &Settings) -> ClientResult<Self> {
        let cache = SnapshotCache::new();
        let transport = Transport::spawn(&settings.connection, cache.clone())?;
        transport.ready().await?;

        let planner = Arc::new(Mutex::new(Planner::new()));
        let requester: Arc<dyn Requester> = Arc::new(transport.clone());
        let coordinator = Arc::new(Coordinator::new(
            requester,
            planner.clone(),
            cache.clone(),
            settings.connection.node_id.clone(),
        ));
        let watcher = spawn_watcher(coordinator.clone(), &cache);

        let client = Self {
            transport,
            cache,
            planner,
            coordinator,
            node_id: settings.connection.node_id.clone(),
            watcher,
        };
        client.request(ClientCommand::GetSnapshot).await?;
        Ok(client)
    }

    // --- Read accessors ---

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        self.cache.latest()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn plan(&self) -> TurnPlan {
        self.planner.lock().unwrap().plan().clone()
    }

    pub fn plan_locked(&self) -> bool {
        self.planner.lock().unwrap().is_locked()
    }

    pub fn phase(&self) -> TurnPhase {
        self.coordinator.phase()
    }

    pub fn has_stakes_offer(&self) -> bool {
        self.coordinator.has_stakes_offer()
    }

    pub fn seat(&self) -> ClientResult<Seat> {
        self.coordinator.seat()
    }

    pub fn available_mana(&self) -> ClientResult<u8> {
        let snapshot = self.cache.latest().ok_or(ClientError::NoActiveGame)?;
        let game = snapshot.game.ok_or(ClientError::NoActiveGame)?;
        let seat = self.seat()?;
        Ok(self.planner.lock().unwrap().available_mana(&game, &seat))
    }

    /// Would this action be accepted right now, and which zones may it land
    /// in? Purely advisory; queueing re-checks.
    pub fn check(&self, action: &ActionKind) -> ClientResult<PlayCheck> {
        let snapshot = self.cache.latest().ok_or(ClientError::NoActiveGame)?;
        let game = snapshot.game.ok_or(ClientError::NoActiveGame)?;
        let seat = self.seat()?;
        let planner = self.planner.lock().unwrap();
        Ok(legality::can_play(action, planner.plan(), &game, &seat))
    }

    // --- Plan mutation ---

    pub fn queue(&self, action: ActionKind) -> ClientResult<PlayCheck> {
        let snapshot = self.cache.latest().ok_or(ClientError::NoActiveGame)?;
        let game = snapshot.game.ok_or(ClientError::NoActiveGame)?;
        let seat = self.seat()?;
        Ok(self.planner.lock().unwrap().queue(action, &game, &seat))
    }

    pub fn remove(&self, card_id: &str) {
        self.planner.lock().unwrap().remove(card_id);
    }

    // --- Turn and stakes flow ---

    pub async fn end_turn(&self) -> ClientResult<()> {
        self.coordinator.end_turn().await
    }

    pub async fn call_stakes(&self) -> ClientResult<()> {
        self.coordinator.call_stakes().await
    }

    pub async fn accept_stakes(&self) -> ClientResult<()> {
        self.coordinator.accept_stakes().await
    }

    pub async fn decline_stakes(&self) -> ClientResult<()> {
        self.coordinator.decline_stakes().await
    }

    // --- Match and lobby operations ---

    pub async fn refresh_snapshot(&self) -> ClientResult<()> {
        self.request(ClientCommand::GetSnapshot).await
    }

    pub async fn new_game(&self, opponent: Option<String>) -> ClientResult<()> {
        self.request(ClientCommand::NewGame { opponent }).await
    }

    pub async fn host_lobby(&self, config: LobbyConfig) -> ClientResult<()> {
        self.request(ClientCommand::HostLobby(config)).await
    }

    pub async fn join_lobby(&self, lobby_id: String, deck: Vec<String>) -> ClientResult<()> {
        self.request(ClientCommand::JoinLobby { lobby_id, deck }).await
    }

    pub async fn start_lobby_game(&self, lobby_id: String) -> ClientResult<()> {
        self.request(ClientCommand::StartLobbyGame { lobby_id }).await
    }

    pub async fn fetch_remote_lobbies(&self, host_node: String) -> ClientResult<()> {
        self.request(ClientCommand::FetchRemoteLobbies { host_node })
            .await
    }

    pub async fn join_remote_lobby(
        &self,
        host_node: String,
        lobby_id: String,
        deck: Vec<String>,
    ) -> ClientResult<()> {
        self.request(ClientCommand::JoinRemoteLobby {
            host_node,
            lobby_id,
            deck,
        })
        .await
    }

    pub async fn sync_remote_game(&self, host_node: String) -> ClientResult<()> {
        self.request(ClientCommand::SyncRemoteGame { host_node }).await
    }

    pub async fn reset_server(&self) -> ClientResult<()> {
        self.request(ClientCommand::Reset).await
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Issue a request and accept any non-error reply. Snapshot replies have
    /// already refreshed the cache by the time they resolve here.
    async fn request(&self, command: ClientCommand) -> ClientResult<()> {
        match self.transport.request(command).await? {
            ServerReply::Snapshot(_) | ServerReply::Ack => Ok(()),
            ServerReply::Error(message) => Err(ClientError::Server(message)),
        }
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.watcher.abort();
        self.transport.shutdown();
    }
}

/// Feed every cache update to the coordinator, strictly in order. This task
/// is the only caller of `on_snapshot`, which is what makes the reveal
/// decision race-free.
fn spawn_watcher(coordinator: Arc<Coordinator>, cache: &SnapshotCache) -> JoinHandle<()> {
    let mut updates = cache.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            coordinator.on_snapshot(snapshot.as_ref());
        }
        debug!("snapshot watcher stopped");
    })
}
