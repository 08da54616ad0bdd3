//! Bounded block scans over boxes, spheres and horizontal layers.
//!
//! Every scan walks its volume one Y layer at a time and submits each layer as
//! a single [`Bot::blocks_at`] batch. Results are grouped by block name and
//! rendered as plain text, truncated so a large volume never floods the model
//! with thousands of lines.

use crate::bot::{Block, BlockPos, Bot, Vec3};
use color_eyre::eyre::Result;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Longest edge of a box scan, per axis.
pub const MAX_AREA_SPAN: i32 = 32;
pub const MAX_SCAN_RADIUS: i32 = 16;
pub const MAX_LAYER_RADIUS: i32 = 16;
pub const MAX_LAYERS: i32 = 32;
pub const SAMPLE_POSITIONS: usize = 5;
pub const MAX_LISTED_TYPES: usize = 30;
pub const MAX_TYPES_PER_LAYER: usize = 8;

/// Inclusive axis-aligned box of block positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Area {
    /// Box spanned by two opposite corners given in any order.
    pub fn spanning(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Shrinks each axis to at most `span` blocks measured from the minimum
    /// corner. The flag reports whether anything was cut off.
    pub fn capped(self, span: i32) -> (Self, bool) {
        let cap = |min: i32, max: i32| max.min(min.saturating_add(span - 1));
        let max = BlockPos::new(
            cap(self.min.x, self.max.x),
            cap(self.min.y, self.max.y),
            cap(self.min.z, self.max.z),
        );
        (Self { min: self.min, max }, max != self.max)
    }

    pub fn volume(&self) -> i64 {
        let edge = |min: i32, max: i32| i64::from(max) - i64::from(min) + 1;
        edge(self.min.x, self.max.x) * edge(self.min.y, self.max.y) * edge(self.min.z, self.max.z)
    }
}

/// Positions grouped by block name plus bookkeeping about the cells visited.
#[derive(Debug, Default)]
struct Tally {
    groups: BTreeMap<String, Vec<BlockPos>>,
    scanned: usize,
    unloaded: usize,
}

impl Tally {
    fn add_layer(&mut self, positions: &[BlockPos], blocks: Vec<Option<Block>>, include_air: bool) {
        self.scanned += positions.len();
        for (position, block) in positions.iter().zip(blocks) {
            match block {
                None => self.unloaded += 1,
                Some(block) if block.is_air() && !include_air => {}
                Some(block) => self.groups.entry(block.name).or_default().push(*position),
            }
        }
    }

    /// Groups ordered by count descending, ties broken by name.
    fn by_count(&self) -> Vec<(&str, &[BlockPos])> {
        let mut groups: Vec<_> = self
            .groups
            .iter()
            .map(|(name, positions)| (name.as_str(), positions.as_slice()))
            .collect();
        groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));
        groups
    }
}

async fn scan_layer(
    bot: &dyn Bot,
    tally: &mut Tally,
    positions: &[BlockPos],
    include_air: bool,
) -> Result<()> {
    if positions.is_empty() {
        return Ok(());
    }
    let blocks = bot.blocks_at(positions).await?;
    tally.add_layer(positions, blocks, include_air);
    Ok(())
}

pub async fn blocks_in_area(
    bot: &dyn Bot,
    corner_a: BlockPos,
    corner_b: BlockPos,
    include_air: bool,
) -> Result<String> {
    let (area, truncated) =
        Area::spanning(corner_a.in_world()?, corner_b.in_world()?).capped(MAX_AREA_SPAN);
    tracing::debug!(?area, truncated, "Scanning area");

    let mut tally = Tally::default();
    let mut layer = Vec::new();
    for y in area.min.y..=area.max.y {
        layer.clear();
        for x in area.min.x..=area.max.x {
            for z in area.min.z..=area.max.z {
                layer.push(BlockPos::new(x, y, z));
            }
        }
        scan_layer(bot, &mut tally, &layer, include_air).await?;
    }

    let mut out = format!(
        "Scanned {} blocks from {} to {}",
        area.volume(),
        area.min,
        area.max
    );
    if truncated {
        let _ = write!(out, " (area capped to {MAX_AREA_SPAN} blocks per axis)");
    }
    out.push(':');
    push_unloaded_note(&mut out, tally.unloaded);

    let groups = tally.by_count();
    if groups.is_empty() {
        out.push_str("\nNo non-air blocks found in area");
        return Ok(out);
    }
    let _ = write!(out, "\n{} block types found:", groups.len());
    for (name, positions) in groups.iter().take(MAX_LISTED_TYPES) {
        let samples: Vec<String> = positions
            .iter()
            .take(SAMPLE_POSITIONS)
            .map(ToString::to_string)
            .collect();
        let more = if positions.len() > SAMPLE_POSITIONS {
            ", ..."
        } else {
            ""
        };
        let _ = write!(
            out,
            "\n- {name}: {} (e.g. {}{more})",
            positions.len(),
            samples.join(", ")
        );
    }
    push_remaining_types(&mut out, groups.len());
    Ok(out)
}

pub async fn blocks_in_radius(
    bot: &dyn Bot,
    center: Option<Vec3>,
    radius: i32,
    include_air: bool,
) -> Result<String> {
    let center = match center {
        Some(center) => center,
        None => bot.position().await?,
    };
    let origin = BlockPos::containing(center).in_world()?;
    let radius = radius.clamp(0, MAX_SCAN_RADIUS);
    let radius_sq = radius * radius;
    tracing::debug!(%origin, radius, "Scanning sphere");

    let mut tally = Tally::default();
    let mut layer = Vec::new();
    for dy in -radius..=radius {
        layer.clear();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                if dx * dx + dy * dy + dz * dz <= radius_sq {
                    layer.push(origin + BlockPos::new(dx, dy, dz));
                }
            }
        }
        scan_layer(bot, &mut tally, &layer, include_air).await?;
    }

    let mut out = format!(
        "Scanned {} blocks within radius {radius} of {origin}:",
        tally.scanned
    );
    push_unloaded_note(&mut out, tally.unloaded);

    let mut groups: Vec<(&str, usize, BlockPos, f64)> = tally
        .groups
        .iter()
        .filter_map(|(name, positions)| {
            positions
                .iter()
                .map(|pos| (*pos, pos.distance_to(origin)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
                .map(|(nearest, distance)| (name.as_str(), positions.len(), nearest, distance))
        })
        .collect();
    if groups.is_empty() {
        out.push_str("\nNo non-air blocks found within radius");
        return Ok(out);
    }
    groups.sort_by(|a, b| a.3.total_cmp(&b.3).then_with(|| a.0.cmp(b.0)));

    let _ = write!(out, "\n{} block types found:", groups.len());
    for (name, count, nearest, distance) in groups.iter().take(MAX_LISTED_TYPES) {
        let _ = write!(
            out,
            "\n- {name}: {count} blocks, nearest at {nearest} ({distance:.1} blocks away)"
        );
    }
    push_remaining_types(&mut out, groups.len());
    Ok(out)
}

/// Optional inputs for [`scan_layers`]; anything left out is taken from the bot.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerScan {
    pub x: Option<f64>,
    pub z: Option<f64>,
    pub y_start: Option<i32>,
    pub y_end: Option<i32>,
    pub radius: i32,
    pub include_air: bool,
}

pub async fn scan_layers(bot: &dyn Bot, request: LayerScan) -> Result<String> {
    let needs_position = request.x.is_none()
        || request.z.is_none()
        || request.y_start.is_none()
        || request.y_end.is_none();
    let here = if needs_position {
        Some(BlockPos::containing(bot.position().await?))
    } else {
        None
    };
    let from_bot = |axis: fn(BlockPos) -> i32| here.map(axis).unwrap_or_default();

    let center_x = request
        .x
        .map(|x| x.floor() as i32)
        .unwrap_or_else(|| from_bot(|p| p.x));
    let center_z = request
        .z
        .map(|z| z.floor() as i32)
        .unwrap_or_else(|| from_bot(|p| p.z));
    let bot_y = from_bot(|p| p.y);
    let first = request.y_start.unwrap_or(bot_y.saturating_sub(2));
    let second = request.y_end.unwrap_or(bot_y.saturating_add(2));
    BlockPos::new(center_x, first, center_z).in_world()?;
    BlockPos::new(center_x, second, center_z).in_world()?;
    let top = first.max(second);
    let bottom = first.min(second).max(top - (MAX_LAYERS - 1));
    let truncated = first.min(second) < bottom;
    let radius = request.radius.clamp(0, MAX_LAYER_RADIUS);
    tracing::debug!(center_x, center_z, top, bottom, radius, "Scanning layers");

    let mut out = format!(
        "Layer scan around ({center_x}, {center_z}) radius {radius}, Y {top} to {bottom}"
    );
    if truncated {
        let _ = write!(out, " (capped to {MAX_LAYERS} layers)");
    }
    out.push(':');

    let mut layer = Vec::new();
    for y in (bottom..=top).rev() {
        layer.clear();
        for x in (center_x - radius)..=(center_x + radius) {
            for z in (center_z - radius)..=(center_z + radius) {
                layer.push(BlockPos::new(x, y, z));
            }
        }
        let mut tally = Tally::default();
        scan_layer(bot, &mut tally, &layer, request.include_air).await?;
        out.push_str(&render_layer(y, &tally));
    }
    Ok(out)
}

fn render_layer(y: i32, tally: &Tally) -> String {
    let groups = tally.by_count();
    let mut line = format!("\nY={y}: ");
    if groups.is_empty() {
        line.push_str("empty");
    } else {
        let listed: Vec<String> = groups
            .iter()
            .take(MAX_TYPES_PER_LAYER)
            .map(|(name, positions)| format!("{name} x{}", positions.len()))
            .collect();
        line.push_str(&listed.join(", "));
        if groups.len() > MAX_TYPES_PER_LAYER {
            let _ = write!(line, ", +{} more", groups.len() - MAX_TYPES_PER_LAYER);
        }
    }
    if tally.unloaded > 0 {
        let _ = write!(line, " ({} unloaded)", tally.unloaded);
    }
    line
}

fn push_unloaded_note(out: &mut String, unloaded: usize) {
    if unloaded > 0 {
        let _ = write!(out, "\n{unloaded} cells were not loaded and were skipped");
    }
}

fn push_remaining_types(out: &mut String, total: usize) {
    if total > MAX_LISTED_TYPES {
        let _ = write!(out, "\n... and {} more block types", total - MAX_LISTED_TYPES);
    }
}
