//! Long-poll HTTP bridge to the bot runtime.
//!
//! The runtime owns the game connection. It fetches the session settings,
//! long-polls `/request` for queued [`BotCommand`]s and posts the outcome of
//! each one to `/response`. Chat and connection events arrive on `/event`.

use crate::bot::{Block, BlockPos, Bot, Control, Entity, EquipDestination, GameMode, Item, Vec3};
use crate::chat_log::SharedChatLog;
use crate::config::{BridgeTimeouts, SessionConfig};
use crate::error::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use color_eyre::eyre::{self, eyre, Error, OptionExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::time::Duration;
use uuid::Uuid;

const LONG_POLL_DURATION: Duration = Duration::from_secs(15);

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "command", content = "params", rename_all = "camelCase")]
pub enum BotCommand {
    Position,
    Goto { target: Vec3, range: f64 },
    LookAt { target: Vec3 },
    SetControlState { control: Control, state: bool },
    CanFly,
    FlyTo { destination: Vec3 },
    StopFlying,
    Inventory,
    Equip { item: String, destination: EquipDestination },
    BlocksAt { positions: Vec<BlockPos> },
    CanDig { position: BlockPos },
    Dig { position: BlockPos },
    PlaceBlock { reference: BlockPos, face: BlockPos },
    #[serde(rename_all = "camelCase")]
    FindBlock { block_type: String, max_distance: u32 },
    Entities,
    Chat { message: String },
    GameMode,
}

impl BotCommand {
    fn timeout(&self, timeouts: &BridgeTimeouts) -> Option<Duration> {
        match self {
            // The flight wrapper races its own timer and cancels explicitly.
            BotCommand::FlyTo { .. } => None,
            BotCommand::Goto { .. } | BotCommand::Dig { .. } => Some(timeouts.action),
            _ => Some(timeouts.request),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BotRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub command: BotCommand,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BotResponse {
    pub id: Uuid,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BotEvent {
    Spawned { username: String },
    Chat { username: String, message: String },
    Kicked { reason: String },
    Error { message: String },
    End { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bot runtime did not answer `{command}` within {} seconds", .timeout.as_secs_f64())]
    Timeout { command: String, timeout: Duration },
    #[error("bot runtime dropped the `{0}` request")]
    Dropped(String),
    #[error("{0}")]
    Remote(String),
}

type Outcome = std::result::Result<JsonValue, String>;

pub struct BridgeState {
    process_queue: VecDeque<BotRequest>,
    output_map: HashMap<Uuid, oneshot::Sender<Outcome>>,
    waiter: watch::Receiver<()>,
    trigger: watch::Sender<()>,
    session: SessionConfig,
    chat_log: SharedChatLog,
    disconnect: Option<oneshot::Sender<String>>,
}
pub type PackedState = Arc<Mutex<BridgeState>>;

impl BridgeState {
    pub fn new(
        session: SessionConfig,
        chat_log: SharedChatLog,
        disconnect: oneshot::Sender<String>,
    ) -> Self {
        let (trigger, waiter) = watch::channel(());
        Self {
            process_queue: VecDeque::new(),
            output_map: HashMap::new(),
            waiter,
            trigger,
            session,
            chat_log,
            disconnect: Some(disconnect),
        }
    }

    pub fn packed(self) -> PackedState {
        Arc::new(Mutex::new(self))
    }

    fn withdraw(&mut self, id: Uuid) {
        self.output_map.remove(&id);
        self.process_queue.retain(|request| request.id != id);
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.output_map.len()
    }

    #[cfg(test)]
    pub fn queued(&self) -> usize {
        self.process_queue.len()
    }
}

pub fn router(state: PackedState) -> Router {
    Router::new()
        .route("/session", get(session_handler))
        .route("/request", get(request_handler))
        .route("/response", post(response_handler))
        .route("/event", post(event_handler))
        .with_state(state)
}

pub async fn session_handler(State(state): State<PackedState>) -> Json<SessionConfig> {
    Json(state.lock().await.session.clone())
}

pub async fn request_handler(State(state): State<PackedState>) -> Result<impl IntoResponse> {
    let timeout = tokio::time::timeout(LONG_POLL_DURATION, async {
        loop {
            let mut waiter = {
                let mut state = state.lock().await;
                if let Some(task) = state.process_queue.pop_front() {
                    return Ok::<BotRequest, Error>(task);
                }
                let mut waiter = state.waiter.clone();
                let _ = waiter.borrow_and_update();
                waiter
            };
            waiter.changed().await?
        }
    })
    .await;
    match timeout {
        Ok(result) => Ok(Json(result?).into_response()),
        _ => Ok((StatusCode::LOCKED, String::new()).into_response()),
    }
}

pub async fn response_handler(
    State(state): State<PackedState>,
    Json(payload): Json<BotResponse>,
) -> Result<impl IntoResponse> {
    tracing::debug!("Received reply from bot runtime {payload:?}");
    let tx = state
        .lock()
        .await
        .output_map
        .remove(&payload.id)
        .ok_or_eyre("Unknown ID")?;
    let outcome = match payload.error {
        Some(error) => Err(error),
        None => Ok(payload.result.unwrap_or(JsonValue::Null)),
    };
    if tx.send(outcome).is_err() {
        tracing::debug!(id = %payload.id, "Caller stopped waiting for reply");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn event_handler(
    State(state): State<PackedState>,
    Json(event): Json<BotEvent>,
) -> StatusCode {
    let mut state = state.lock().await;
    match event {
        BotEvent::Spawned { username } => {
            tracing::info!("Bot spawned as {username}");
            state.session.username = username;
        }
        BotEvent::Chat { username, message } => {
            if username != state.session.username {
                state.chat_log.lock().await.record(username, message);
            }
        }
        BotEvent::Error { message } => {
            tracing::warn!("Bot runtime reported an error: {message}");
        }
        BotEvent::Kicked { reason } => {
            tracing::error!("Bot was kicked: {reason}");
            if let Some(tx) = state.disconnect.take() {
                tx.send(format!("kicked: {reason}")).ok();
            }
        }
        BotEvent::End { reason } => {
            tracing::error!("Bot disconnected: {reason}");
            if let Some(tx) = state.disconnect.take() {
                tx.send(format!("connection ended: {reason}")).ok();
            }
        }
    }
    StatusCode::NO_CONTENT
}

/// Removes a request from the queue and the pending map when its caller goes
/// away before the runtime answered.
struct PendingRequest {
    state: PackedState,
    id: Uuid,
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        let id = self.id;
        if let Ok(mut state) = self.state.try_lock() {
            state.withdraw(id);
            return;
        }
        // Contended: finish on a task so drop never blocks.
        let state = Arc::clone(&self.state);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                state.lock().await.withdraw(id);
            });
        }
    }
}

/// [`Bot`] implementation that forwards every call over the bridge.
#[derive(Clone)]
pub struct BridgeBot {
    state: PackedState,
    timeouts: BridgeTimeouts,
}

impl BridgeBot {
    pub fn new(state: PackedState, timeouts: BridgeTimeouts) -> Self {
        Self { state, timeouts }
    }

    async fn call<T: DeserializeOwned>(&self, command: BotCommand) -> eyre::Result<T> {
        let value = self.send(command).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Runs a command whose reply carries nothing the caller needs.
    async fn act(&self, command: BotCommand) -> eyre::Result<()> {
        self.send(command).await?;
        Ok(())
    }

    async fn send(&self, command: BotCommand) -> std::result::Result<JsonValue, BridgeError> {
        let id = Uuid::new_v4();
        let timeout = command.timeout(&self.timeouts);
        let name = command_name(&command);
        let request = BotRequest { id, command };
        tracing::debug!("Running command: {:?}", request);

        let (tx, rx) = oneshot::channel();
        let trigger = {
            let mut state = self.state.lock().await;
            state.process_queue.push_back(request);
            state.output_map.insert(id, tx);
            state.trigger.clone()
        };
        let _pending = PendingRequest {
            state: Arc::clone(&self.state),
            id,
        };
        trigger.send(()).ok();

        let outcome = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, rx)
                .await
                .map_err(|_| BridgeError::Timeout {
                    command: name.clone(),
                    timeout,
                })?,
            None => rx.await,
        }
        .map_err(|_| BridgeError::Dropped(name))?;
        tracing::debug!("Bot runtime replied: {outcome:?}");
        outcome.map_err(BridgeError::Remote)
    }
}

fn command_name(command: &BotCommand) -> String {
    serde_json::to_value(command)
        .ok()
        .and_then(|value| value.get("command").and_then(|c| c.as_str()).map(String::from))
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl Bot for BridgeBot {
    async fn position(&self) -> eyre::Result<Vec3> {
        self.call(BotCommand::Position).await
    }

    async fn goto(&self, target: Vec3, range: f64) -> eyre::Result<()> {
        self.act(BotCommand::Goto { target, range }).await
    }

    async fn look_at(&self, target: Vec3) -> eyre::Result<()> {
        self.act(BotCommand::LookAt { target }).await
    }

    async fn set_control_state(&self, control: Control, state: bool) -> eyre::Result<()> {
        self.act(BotCommand::SetControlState { control, state })
            .await
    }

    async fn can_fly(&self) -> eyre::Result<bool> {
        self.call(BotCommand::CanFly).await
    }

    async fn fly_to(&self, destination: Vec3) -> eyre::Result<()> {
        self.act(BotCommand::FlyTo { destination }).await
    }

    async fn stop_flying(&self) -> eyre::Result<()> {
        self.act(BotCommand::StopFlying).await
    }

    async fn inventory(&self) -> eyre::Result<Vec<Item>> {
        self.call(BotCommand::Inventory).await
    }

    async fn equip(&self, item: &Item, destination: EquipDestination) -> eyre::Result<()> {
        self.act(BotCommand::Equip {
            item: item.name.clone(),
            destination,
        })
        .await
    }

    async fn block_at(&self, position: BlockPos) -> eyre::Result<Option<Block>> {
        let mut blocks = self.blocks_at(&[position]).await?;
        blocks.pop().ok_or_eyre("bot runtime returned no block")
    }

    async fn blocks_at(&self, positions: &[BlockPos]) -> eyre::Result<Vec<Option<Block>>> {
        let blocks: Vec<Option<Block>> = self
            .call(BotCommand::BlocksAt {
                positions: positions.to_vec(),
            })
            .await?;
        if blocks.len() != positions.len() {
            return Err(eyre!(
                "bot runtime returned {} blocks for {} positions",
                blocks.len(),
                positions.len()
            ));
        }
        Ok(blocks)
    }

    async fn can_dig(&self, position: BlockPos) -> eyre::Result<bool> {
        self.call(BotCommand::CanDig { position }).await
    }

    async fn dig(&self, position: BlockPos) -> eyre::Result<()> {
        self.act(BotCommand::Dig { position }).await
    }

    async fn place_block(&self, reference: BlockPos, face: BlockPos) -> eyre::Result<()> {
        self.act(BotCommand::PlaceBlock { reference, face }).await
    }

    async fn find_block(&self, block_type: &str, max_distance: u32) -> eyre::Result<Option<Block>> {
        self.call(BotCommand::FindBlock {
            block_type: block_type.to_string(),
            max_distance,
        })
        .await
    }

    async fn entities(&self) -> eyre::Result<Vec<Entity>> {
        self.call(BotCommand::Entities).await
    }

    async fn chat(&self, message: &str) -> eyre::Result<()> {
        self.act(BotCommand::Chat {
            message: message.to_string(),
        })
        .await
    }

    async fn game_mode(&self) -> eyre::Result<GameMode> {
        self.call(BotCommand::GameMode).await
    }
}
