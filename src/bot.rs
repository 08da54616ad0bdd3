//! Types exchanged with the bot runtime and the [`Bot`] trait every tool talks to.

use async_trait::async_trait;
use color_eyre::eyre::{eyre, Result};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

const AIR_BLOCKS: [&str; 3] = ["air", "cave_air", "void_air"];

/// Horizontal world border; no axis of a valid position goes past it.
pub const WORLD_LIMIT: i32 = 30_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: Vec3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One decimal per axis, used when reporting exact entity and bot positions.
impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing the given world position.
    pub fn containing(pos: Vec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// Rejects positions past the world border, which also keeps offset
    /// arithmetic on them far away from `i32` overflow.
    pub fn in_world(self) -> Result<Self> {
        let inside = |v: i32| (-WORLD_LIMIT..=WORLD_LIMIT).contains(&v);
        if inside(self.x) && inside(self.y) && inside(self.z) {
            Ok(self)
        } else {
            Err(eyre!(
                "Position {self} is outside the world (coordinates are limited to {WORLD_LIMIT} blocks from the origin)"
            ))
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }

    pub fn distance_to(&self, other: BlockPos) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Add for BlockPos {
    type Output = BlockPos;

    fn add(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for BlockPos {
    type Output = BlockPos;

    fn sub(self, rhs: BlockPos) -> BlockPos {
        BlockPos::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Block description as reported by the bot runtime. Only `name` and
/// `position` are guaranteed; everything else depends on the block and the
/// runtime's registry data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub name: String,
    pub position: BlockPos,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub type_id: Option<u32>,
    #[serde(default)]
    pub metadata: Option<u32>,
    #[serde(default)]
    pub hardness: Option<f64>,
    #[serde(default)]
    pub diggable: Option<bool>,
    #[serde(default)]
    pub transparent: Option<bool>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub biome: Option<String>,
    #[serde(default)]
    pub light: Option<u8>,
    #[serde(default)]
    pub sky_light: Option<u8>,
    #[serde(default)]
    pub bounding_box: Option<String>,
    #[serde(default)]
    pub harvest_tools: Vec<String>,
}

impl Block {
    pub fn new(name: impl Into<String>, position: BlockPos) -> Self {
        Self {
            name: name.into(),
            position,
            ..Default::default()
        }
    }

    pub fn is_air(&self) -> bool {
        AIR_BLOCKS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub count: u32,
    #[serde(default)]
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub position: Vec3,
}

impl Entity {
    /// Most specific label available: player name, then entity name, then type.
    pub fn label(&self) -> &str {
        self.username
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Survival => "survival",
            GameMode::Creative => "creative",
            GameMode::Adventure => "adventure",
            GameMode::Spectator => "spectator",
        };
        f.write_str(name)
    }
}

/// Movement controls the runtime can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Forward,
    Back,
    Left,
    Right,
    Jump,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
}

impl Direction {
    pub fn control(self) -> Control {
        match self {
            Direction::Forward => Control::Forward,
            Direction::Back => Control::Back,
            Direction::Left => Control::Left,
            Direction::Right => Control::Right,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Forward => "forward",
            Direction::Back => "back",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    #[default]
    Up,
    Down,
    North,
    South,
    East,
    West,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Up,
        Face::Down,
        Face::North,
        Face::South,
        Face::East,
        Face::West,
    ];

    /// Unit vector pointing out of this face.
    pub fn vector(self) -> BlockPos {
        match self {
            Face::Up => BlockPos::new(0, 1, 0),
            Face::Down => BlockPos::new(0, -1, 0),
            Face::North => BlockPos::new(0, 0, -1),
            Face::South => BlockPos::new(0, 0, 1),
            Face::East => BlockPos::new(1, 0, 0),
            Face::West => BlockPos::new(-1, 0, 0),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Face::Up => "up",
            Face::Down => "down",
            Face::North => "north",
            Face::South => "south",
            Face::East => "east",
            Face::West => "west",
        };
        f.write_str(name)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum EquipDestination {
    #[default]
    Hand,
    Head,
    Torso,
    Legs,
    Feet,
    OffHand,
}

impl fmt::Display for EquipDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EquipDestination::Hand => "hand",
            EquipDestination::Head => "head",
            EquipDestination::Torso => "torso",
            EquipDestination::Legs => "legs",
            EquipDestination::Feet => "feet",
            EquipDestination::OffHand => "off-hand",
        };
        f.write_str(name)
    }
}

/// Boundary between the MCP tools and whatever drives the actual bot.
#[async_trait]
pub trait Bot: Send + Sync {
    async fn position(&self) -> Result<Vec3>;

    /// Pathfind until the bot is within `range` blocks of `target`.
    async fn goto(&self, target: Vec3, range: f64) -> Result<()>;

    async fn look_at(&self, target: Vec3) -> Result<()>;

    async fn set_control_state(&self, control: Control, state: bool) -> Result<()>;

    /// Whether creative flight is currently available.
    async fn can_fly(&self) -> Result<bool>;

    async fn fly_to(&self, destination: Vec3) -> Result<()>;

    /// Abort an in-progress flight.
    async fn stop_flying(&self) -> Result<()>;

    async fn inventory(&self) -> Result<Vec<Item>>;

    async fn equip(&self, item: &Item, destination: EquipDestination) -> Result<()>;

    /// `None` when the cell is not loaded.
    async fn block_at(&self, position: BlockPos) -> Result<Option<Block>>;

    /// Batched lookup, one entry per requested position in the same order.
    async fn blocks_at(&self, positions: &[BlockPos]) -> Result<Vec<Option<Block>>> {
        let mut blocks = Vec::with_capacity(positions.len());
        for position in positions {
            blocks.push(self.block_at(*position).await?);
        }
        Ok(blocks)
    }

    async fn can_dig(&self, position: BlockPos) -> Result<bool>;

    async fn dig(&self, position: BlockPos) -> Result<()>;

    /// Place the held block against `face` of the block at `reference`.
    async fn place_block(&self, reference: BlockPos, face: BlockPos) -> Result<()>;

    async fn find_block(&self, block_type: &str, max_distance: u32) -> Result<Option<Block>>;

    async fn entities(&self) -> Result<Vec<Entity>>;

    async fn chat(&self, message: &str) -> Result<()>;

    async fn game_mode(&self) -> Result<GameMode>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory bot used by the tool and scanner tests.

    use super::*;
    use color_eyre::eyre::eyre;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::time::Duration;

    pub struct MockBot {
        pub position: Mutex<Vec3>,
        pub blocks: Mutex<HashMap<BlockPos, Block>>,
        pub unloaded: HashSet<BlockPos>,
        pub inventory: Vec<Item>,
        pub entities: Vec<Entity>,
        pub game_mode: GameMode,
        pub flight_time: Option<Duration>,
        pub undiggable: HashSet<BlockPos>,
        pub rejected_references: HashSet<BlockPos>,
        /// Number of upcoming `look_at` calls that fail.
        pub failing_looks: Mutex<usize>,
        pub calls: Mutex<Vec<String>>,
    }

    impl Default for MockBot {
        fn default() -> Self {
            Self {
                position: Mutex::new(Vec3::new(0.5, 64.0, 0.5)),
                blocks: Mutex::new(HashMap::new()),
                unloaded: HashSet::new(),
                inventory: Vec::new(),
                entities: Vec::new(),
                game_mode: GameMode::Survival,
                flight_time: None,
                undiggable: HashSet::new(),
                rejected_references: HashSet::new(),
                failing_looks: Mutex::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockBot {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_block(self, name: &str, position: BlockPos) -> Self {
            self.blocks
                .lock()
                .unwrap()
                .insert(position, Block::new(name, position));
            self
        }

        /// Fill every cell of the inclusive box with `name`.
        pub fn with_box(self, name: &str, min: BlockPos, max: BlockPos) -> Self {
            {
                let mut blocks = self.blocks.lock().unwrap();
                for x in min.x..=max.x {
                    for y in min.y..=max.y {
                        for z in min.z..=max.z {
                            let position = BlockPos::new(x, y, z);
                            blocks.insert(position, Block::new(name, position));
                        }
                    }
                }
            }
            self
        }

        pub fn with_position(self, position: Vec3) -> Self {
            *self.position.lock().unwrap() = position;
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    #[async_trait]
    impl Bot for MockBot {
        async fn position(&self) -> Result<Vec3> {
            Ok(*self.position.lock().unwrap())
        }

        async fn goto(&self, target: Vec3, range: f64) -> Result<()> {
            self.record(format!("goto {target} within {range}"));
            *self.position.lock().unwrap() = target;
            Ok(())
        }

        async fn look_at(&self, target: Vec3) -> Result<()> {
            {
                let mut failing = self.failing_looks.lock().unwrap();
                if *failing > 0 {
                    *failing -= 1;
                    return Err(eyre!("Look interrupted"));
                }
            }
            self.record(format!("look_at {target}"));
            Ok(())
        }

        async fn set_control_state(&self, control: Control, state: bool) -> Result<()> {
            self.record(format!("control {control:?} {state}"));
            Ok(())
        }

        async fn can_fly(&self) -> Result<bool> {
            Ok(self.game_mode == GameMode::Creative)
        }

        async fn fly_to(&self, destination: Vec3) -> Result<()> {
            self.record(format!("fly_to {destination}"));
            if let Some(flight_time) = self.flight_time {
                tokio::time::sleep(flight_time).await;
            }
            *self.position.lock().unwrap() = destination;
            Ok(())
        }

        async fn stop_flying(&self) -> Result<()> {
            self.record("stop_flying");
            Ok(())
        }

        async fn inventory(&self) -> Result<Vec<Item>> {
            Ok(self.inventory.clone())
        }

        async fn equip(&self, item: &Item, destination: EquipDestination) -> Result<()> {
            self.record(format!("equip {} {destination}", item.name));
            Ok(())
        }

        async fn block_at(&self, position: BlockPos) -> Result<Option<Block>> {
            if self.unloaded.contains(&position) {
                return Ok(None);
            }
            let blocks = self.blocks.lock().unwrap();
            Ok(Some(
                blocks
                    .get(&position)
                    .cloned()
                    .unwrap_or_else(|| Block::new("air", position)),
            ))
        }

        async fn blocks_at(&self, positions: &[BlockPos]) -> Result<Vec<Option<Block>>> {
            self.record(format!("blocks_at {}", positions.len()));
            let mut blocks = Vec::with_capacity(positions.len());
            for position in positions {
                blocks.push(self.block_at(*position).await?);
            }
            Ok(blocks)
        }

        async fn can_dig(&self, position: BlockPos) -> Result<bool> {
            Ok(!self.undiggable.contains(&position))
        }

        async fn dig(&self, position: BlockPos) -> Result<()> {
            self.record(format!("dig {position}"));
            self.blocks.lock().unwrap().remove(&position);
            Ok(())
        }

        async fn place_block(&self, reference: BlockPos, face: BlockPos) -> Result<()> {
            if self.rejected_references.contains(&reference) {
                return Err(eyre!("No block has been placed"));
            }
            self.record(format!("place_block {reference} {face}"));
            let target = reference + face;
            self.blocks
                .lock()
                .unwrap()
                .insert(target, Block::new("placed", target));
            Ok(())
        }

        async fn find_block(&self, block_type: &str, max_distance: u32) -> Result<Option<Block>> {
            let origin = BlockPos::containing(*self.position.lock().unwrap());
            let blocks = self.blocks.lock().unwrap();
            Ok(blocks
                .values()
                .filter(|block| block.name == block_type)
                .filter(|block| block.position.distance_to(origin) <= f64::from(max_distance))
                .min_by(|a, b| {
                    a.position
                        .distance_to(origin)
                        .total_cmp(&b.position.distance_to(origin))
                })
                .cloned())
        }

        async fn entities(&self) -> Result<Vec<Entity>> {
            Ok(self.entities.clone())
        }

        async fn chat(&self, message: &str) -> Result<()> {
            self.record(format!("chat {message}"));
            Ok(())
        }

        async fn game_mode(&self) -> Result<GameMode> {
            Ok(self.game_mode)
        }
    }
}
