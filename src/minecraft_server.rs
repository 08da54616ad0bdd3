use crate::bot::{BlockPos, Bot, Direction, EquipDestination, Face, Vec3};
use crate::chat_log::SharedChatLog;
use crate::scan::{self, LayerScan};
use crate::tools;
use color_eyre::eyre;
use rmcp::{
    handler::server::tool::Parameters,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router, ErrorData, ServerHandler,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Clone)]
pub struct MinecraftServer {
    bot: Arc<dyn Bot>,
    chat_log: SharedChatLog,
    flight_timeout: Duration,
    tool_router: rmcp::handler::server::tool::ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for MinecraftServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Controls a Minecraft bot. Use get-position and the scanning tools to look around before moving, digging or placing blocks."
                    .to_string(),
            ),
        }
    }
}

fn default_range() -> f64 {
    1.0
}

fn default_duration() -> u64 {
    1000
}

fn default_max_distance() -> u32 {
    16
}

fn default_chat_count() -> usize {
    10
}

fn default_scan_radius() -> i32 {
    5
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
struct Position {
    #[schemars(description = "X coordinate")]
    x: f64,
    #[schemars(description = "Y coordinate")]
    y: f64,
    #[schemars(description = "Z coordinate")]
    z: f64,
}

impl Position {
    fn vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    fn block(&self) -> BlockPos {
        BlockPos::containing(self.vec3())
    }
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
struct MoveToPosition {
    #[schemars(description = "X coordinate")]
    x: f64,
    #[schemars(description = "Y coordinate")]
    y: f64,
    #[schemars(description = "Z coordinate")]
    z: f64,
    #[serde(default = "default_range")]
    #[schemars(description = "How close to get to the target (default: 1)")]
    range: f64,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
struct MoveInDirection {
    #[schemars(description = "Direction to move")]
    direction: Direction,
    #[serde(default = "default_duration")]
    #[schemars(description = "Duration in milliseconds (default: 1000)")]
    duration: u64,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct FindItem {
    #[schemars(description = "Name or type of item to find")]
    name_or_type: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct EquipItem {
    #[schemars(description = "Name of the item to equip")]
    item_name: String,
    #[serde(default)]
    #[schemars(description = "Where to equip the item (default: hand)")]
    destination: EquipDestination,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct PlaceBlock {
    #[schemars(description = "X coordinate")]
    x: f64,
    #[schemars(description = "Y coordinate")]
    y: f64,
    #[schemars(description = "Z coordinate")]
    z: f64,
    #[serde(default)]
    #[schemars(
        description = "Face of the neighbouring block to place against; other faces are tried when it has none (default: up)"
    )]
    face_direction: Face,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct FindBlock {
    #[schemars(description = "Type of block to find, e.g. oak_log")]
    block_type: String,
    #[serde(default = "default_max_distance")]
    #[schemars(description = "Maximum search distance (default: 16)")]
    max_distance: u32,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct FindEntity {
    #[serde(default, rename = "type")]
    #[schemars(description = "Type of entity to find: player, mob, or an entity name (empty for any)")]
    kind: Option<String>,
    #[serde(default = "default_max_distance")]
    #[schemars(description = "Maximum search distance (default: 16)")]
    max_distance: u32,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
struct SendChat {
    #[schemars(description = "Message to send in chat")]
    message: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
struct ReadChat {
    #[serde(default = "default_chat_count")]
    #[schemars(description = "Number of recent messages to return (default: 10, max: 100)")]
    count: usize,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct BlocksInArea {
    #[schemars(description = "X coordinate of the first corner")]
    x1: f64,
    #[schemars(description = "Y coordinate of the first corner")]
    y1: f64,
    #[schemars(description = "Z coordinate of the first corner")]
    z1: f64,
    #[schemars(description = "X coordinate of the opposite corner")]
    x2: f64,
    #[schemars(description = "Y coordinate of the opposite corner")]
    y2: f64,
    #[schemars(description = "Z coordinate of the opposite corner")]
    z2: f64,
    #[serde(default)]
    #[schemars(description = "Include air blocks in the results (default: false)")]
    include_air: bool,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct BlocksInRadius {
    #[serde(default)]
    #[schemars(description = "Center X coordinate (default: bot position)")]
    x: Option<f64>,
    #[serde(default)]
    #[schemars(description = "Center Y coordinate (default: bot position)")]
    y: Option<f64>,
    #[serde(default)]
    #[schemars(description = "Center Z coordinate (default: bot position)")]
    z: Option<f64>,
    #[schemars(description = "Search radius in blocks (max: 16)")]
    radius: i32,
    #[serde(default)]
    #[schemars(description = "Include air blocks in the results (default: false)")]
    include_air: bool,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
struct ScanLayers {
    #[serde(default)]
    #[schemars(description = "Center X coordinate (default: bot position)")]
    x: Option<f64>,
    #[serde(default)]
    #[schemars(description = "Center Z coordinate (default: bot position)")]
    z: Option<f64>,
    #[serde(default)]
    #[schemars(description = "First layer Y (default: bot Y - 2)")]
    y_start: Option<i32>,
    #[serde(default)]
    #[schemars(description = "Last layer Y (default: bot Y + 2)")]
    y_end: Option<i32>,
    #[serde(default = "default_scan_radius")]
    #[schemars(description = "Horizontal radius of the square scanned on each layer (default: 5, max: 16)")]
    radius: i32,
    #[serde(default)]
    #[schemars(description = "Include air blocks in the results (default: false)")]
    include_air: bool,
}

/// Successful text becomes a normal result, failures an error result.
fn respond(result: eyre::Result<String>) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
        Err(err) => {
            tracing::debug!("Tool failed: {err:#}");
            Ok(CallToolResult::error(vec![Content::text(format!(
                "Error: {err:#}"
            ))]))
        }
    }
}

#[tool_router]
impl MinecraftServer {
    pub fn new(bot: Arc<dyn Bot>, chat_log: SharedChatLog, flight_timeout: Duration) -> Self {
        Self {
            bot,
            chat_log,
            flight_timeout,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(name = "get-position", description = "Get the current position of the bot")]
    async fn get_position(&self) -> Result<CallToolResult, ErrorData> {
        respond(tools::get_position(&*self.bot).await)
    }

    #[tool(
        name = "move-to-position",
        description = "Move the bot to a specific position using pathfinding"
    )]
    async fn move_to_position(
        &self,
        Parameters(args): Parameters<MoveToPosition>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = Vec3::new(args.x, args.y, args.z);
        respond(tools::move_to_position(&*self.bot, target, args.range).await)
    }

    #[tool(name = "look-at", description = "Make the bot look at a specific position")]
    async fn look_at(
        &self,
        Parameters(args): Parameters<Position>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::look_at(&*self.bot, args.vec3()).await)
    }

    #[tool(name = "jump", description = "Make the bot jump")]
    async fn jump(&self) -> Result<CallToolResult, ErrorData> {
        respond(tools::jump(&*self.bot).await)
    }

    #[tool(
        name = "move-in-direction",
        description = "Move the bot in a specific direction for a duration"
    )]
    async fn move_in_direction(
        &self,
        Parameters(args): Parameters<MoveInDirection>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::move_in_direction(&*self.bot, args.direction, args.duration).await)
    }

    #[tool(
        name = "fly-to",
        description = "Make the bot fly directly to a position. Requires creative mode; the flight is abandoned if it takes too long"
    )]
    async fn fly_to(
        &self,
        Parameters(args): Parameters<Position>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::fly_to(&*self.bot, args.vec3(), self.flight_timeout).await)
    }

    #[tool(name = "get-inventory", description = "Get the bot's inventory")]
    async fn get_inventory(&self) -> Result<CallToolResult, ErrorData> {
        respond(tools::get_inventory(&*self.bot).await)
    }

    #[tool(
        name = "find-item",
        description = "Find a specific item in the bot's inventory"
    )]
    async fn find_item(
        &self,
        Parameters(args): Parameters<FindItem>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::find_item(&*self.bot, &args.name_or_type).await)
    }

    #[tool(name = "equip-item", description = "Equip a specific item")]
    async fn equip_item(
        &self,
        Parameters(args): Parameters<EquipItem>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::equip_item(&*self.bot, &args.item_name, args.destination).await)
    }

    #[tool(
        name = "place-block",
        description = "Place the held block at the specified position"
    )]
    async fn place_block(
        &self,
        Parameters(args): Parameters<PlaceBlock>,
    ) -> Result<CallToolResult, ErrorData> {
        let target = BlockPos::containing(Vec3::new(args.x, args.y, args.z));
        respond(tools::place_block(&*self.bot, target, args.face_direction).await)
    }

    #[tool(name = "dig-block", description = "Dig a block at the specified position")]
    async fn dig_block(
        &self,
        Parameters(args): Parameters<Position>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::dig_block(&*self.bot, args.block()).await)
    }

    #[tool(
        name = "get-block-info",
        description = "Get information about a block at the specified position"
    )]
    async fn get_block_info(
        &self,
        Parameters(args): Parameters<Position>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::get_block_info(&*self.bot, args.block()).await)
    }

    #[tool(
        name = "find-block",
        description = "Find the nearest block of a specific type"
    )]
    async fn find_block(
        &self,
        Parameters(args): Parameters<FindBlock>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::find_block(&*self.bot, &args.block_type, args.max_distance).await)
    }

    #[tool(
        name = "find-entity",
        description = "Find the nearest entity of a specific type"
    )]
    async fn find_entity(
        &self,
        Parameters(args): Parameters<FindEntity>,
    ) -> Result<CallToolResult, ErrorData> {
        let kind = args.kind.as_deref().filter(|kind| !kind.is_empty());
        respond(tools::find_entity(&*self.bot, kind, f64::from(args.max_distance)).await)
    }

    #[tool(name = "send-chat", description = "Send a chat message in-game")]
    async fn send_chat(
        &self,
        Parameters(args): Parameters<SendChat>,
    ) -> Result<CallToolResult, ErrorData> {
        respond(tools::send_chat(&*self.bot, &args.message).await)
    }

    #[tool(
        name = "read-chat",
        description = "Read recent chat messages from other players"
    )]
    async fn read_chat(
        &self,
        Parameters(args): Parameters<ReadChat>,
    ) -> Result<CallToolResult, ErrorData> {
        let log = self.chat_log.lock().await;
        respond(Ok(tools::read_chat(&log, args.count)))
    }

    #[tool(
        name = "detect-gamemode",
        description = "Detect the gamemode the bot is playing in"
    )]
    async fn detect_gamemode(&self) -> Result<CallToolResult, ErrorData> {
        respond(tools::detect_gamemode(&*self.bot).await)
    }

    #[tool(
        name = "get-blocks-in-area",
        description = "List the blocks inside a box between two corners, grouped by type. Each axis is capped at 32 blocks"
    )]
    async fn get_blocks_in_area(
        &self,
        Parameters(args): Parameters<BlocksInArea>,
    ) -> Result<CallToolResult, ErrorData> {
        let first = BlockPos::containing(Vec3::new(args.x1, args.y1, args.z1));
        let second = BlockPos::containing(Vec3::new(args.x2, args.y2, args.z2));
        respond(scan::blocks_in_area(&*self.bot, first, second, args.include_air).await)
    }

    #[tool(
        name = "get-blocks-in-radius",
        description = "List the blocks within a spherical radius, grouped by type and sorted by distance. Radius is capped at 16"
    )]
    async fn get_blocks_in_radius(
        &self,
        Parameters(args): Parameters<BlocksInRadius>,
    ) -> Result<CallToolResult, ErrorData> {
        let center = match (args.x, args.y, args.z) {
            (Some(x), Some(y), Some(z)) => Some(Vec3::new(x, y, z)),
            (None, None, None) => None,
            _ => {
                return respond(Err(eyre::eyre!(
                    "x, y and z must be given together or not at all"
                )))
            }
        };
        respond(scan::blocks_in_radius(&*self.bot, center, args.radius, args.include_air).await)
    }

    #[tool(
        name = "scan-layers",
        description = "Summarise the blocks on each horizontal layer around a column, from the top layer down"
    )]
    async fn scan_layers(
        &self,
        Parameters(args): Parameters<ScanLayers>,
    ) -> Result<CallToolResult, ErrorData> {
        let request = LayerScan {
            x: args.x,
            z: args.z,
            y_start: args.y_start,
            y_end: args.y_end,
            radius: args.radius,
            include_air: args.include_air,
        };
        respond(scan::scan_layers(&*self.bot, request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::MockBot;
    use crate::chat_log::ChatLog;

    fn server(bot: MockBot) -> MinecraftServer {
        MinecraftServer::new(Arc::new(bot), ChatLog::shared(), Duration::from_secs(1))
    }

    #[test]
    fn registers_every_tool() {
        let server = server(MockBot::new());
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            [
                "detect-gamemode",
                "dig-block",
                "equip-item",
                "find-block",
                "find-entity",
                "find-item",
                "fly-to",
                "get-block-info",
                "get-blocks-in-area",
                "get-blocks-in-radius",
                "get-inventory",
                "get-position",
                "jump",
                "look-at",
                "move-in-direction",
                "move-to-position",
                "place-block",
                "read-chat",
                "scan-layers",
                "send-chat",
            ]
        );
    }

    #[test]
    fn arguments_accept_camel_case_and_defaults() {
        let place: PlaceBlock =
            serde_json::from_value(serde_json::json!({ "x": 1, "y": 2, "z": 3 })).expect("parse");
        assert_eq!(place.face_direction, Face::Up);

        let scan: ScanLayers =
            serde_json::from_value(serde_json::json!({ "yStart": 60, "includeAir": true }))
                .expect("parse");
        assert_eq!(scan.y_start, Some(60));
        assert_eq!(scan.radius, 5);
        assert!(scan.include_air);

        let entity: FindEntity =
            serde_json::from_value(serde_json::json!({ "type": "player" })).expect("parse");
        assert_eq!(entity.kind.as_deref(), Some("player"));
        assert_eq!(entity.max_distance, 16);

        let equip: EquipItem =
            serde_json::from_value(serde_json::json!({ "itemName": "shield", "destination": "off-hand" }))
                .expect("parse");
        assert_eq!(equip.destination, EquipDestination::OffHand);
    }

    #[tokio::test]
    async fn partial_radius_center_is_rejected() {
        let server = server(MockBot::new());
        let result = server
            .get_blocks_in_radius(Parameters(BlocksInRadius {
                x: Some(1.0),
                y: None,
                z: Some(1.0),
                radius: 2,
                include_air: false,
            }))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn failures_become_error_results() {
        let server = server(MockBot::new());
        let result = server
            .fly_to(Parameters(Position {
                x: 0.0,
                y: 100.0,
                z: 0.0,
            }))
            .await
            .expect("tool result");
        assert_eq!(result.is_error, Some(true));

        let ok = server.get_position().await.expect("tool result");
        assert_eq!(ok.is_error, Some(false));
    }
}
