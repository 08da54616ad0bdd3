//! Text-producing implementations behind each MCP tool. Failures are returned
//! as errors and turned into MCP error results by the server.

use crate::block_info::format_block_info;
use crate::bot::{BlockPos, Bot, Control, Direction, EquipDestination, Face, Vec3};
use crate::chat_log::ChatLog;
use crate::flight::{self, FlightError};
use color_eyre::eyre::{eyre, Result};
use std::fmt::Write;
use tokio::time::Duration;

pub const JUMP_HOLD: Duration = Duration::from_millis(250);
pub const MAX_CHAT_COUNT: usize = 100;

pub async fn get_position(bot: &dyn Bot) -> Result<String> {
    let position = BlockPos::containing(bot.position().await?);
    Ok(format!("Current position: {position}"))
}

pub async fn move_to_position(bot: &dyn Bot, target: Vec3, range: f64) -> Result<String> {
    bot.goto(target, range).await?;
    Ok(format!(
        "Successfully moved to position near {}",
        BlockPos::containing(target)
    ))
}

pub async fn look_at(bot: &dyn Bot, target: Vec3) -> Result<String> {
    bot.look_at(target).await?;
    Ok(format!("Looking at position {}", BlockPos::containing(target)))
}

pub async fn jump(bot: &dyn Bot) -> Result<String> {
    hold_control(bot, Control::Jump, JUMP_HOLD).await?;
    Ok("Successfully jumped".to_string())
}

pub async fn move_in_direction(
    bot: &dyn Bot,
    direction: Direction,
    duration_ms: u64,
) -> Result<String> {
    hold_control(bot, direction.control(), Duration::from_millis(duration_ms)).await?;
    Ok(format!("Moved {direction} for {duration_ms}ms"))
}

/// Presses `control`, waits, then releases it. The release is attempted even
/// when pressing failed so a control is never left held down.
async fn hold_control(bot: &dyn Bot, control: Control, duration: Duration) -> Result<()> {
    let pressed = bot.set_control_state(control, true).await;
    if pressed.is_ok() {
        tokio::time::sleep(duration).await;
    }
    let released = bot.set_control_state(control, false).await;
    pressed?;
    released
}

pub async fn fly_to(bot: &dyn Bot, destination: Vec3, timeout: Duration) -> Result<String> {
    let target = BlockPos::containing(destination);
    match flight::fly_to(bot, destination, timeout).await {
        Ok(()) => Ok(format!("Successfully flew to position {target}")),
        Err(FlightError::Unavailable) => Err(eyre!("{}", FlightError::Unavailable)),
        Err(err) => {
            let here = match bot.position().await {
                Ok(position) => position.to_string(),
                Err(_) => "unknown".to_string(),
            };
            Err(eyre!("Flight failed: {err}. Current position: {here}"))
        }
    }
}

pub async fn get_inventory(bot: &dyn Bot) -> Result<String> {
    let items = bot.inventory().await?;
    if items.is_empty() {
        return Ok("Inventory is empty".to_string());
    }
    let mut out = format!("Found {} item stacks in inventory:\n", items.len());
    for item in &items {
        let _ = write!(out, "\n- {} (x{})", item.name, item.count);
        if let Some(slot) = item.slot {
            let _ = write!(out, " in slot {slot}");
        }
    }
    Ok(out)
}

pub async fn find_item(bot: &dyn Bot, query: &str) -> Result<String> {
    let needle = query.to_lowercase();
    let items = bot.inventory().await?;
    let Some(item) = items
        .iter()
        .find(|item| item.name.to_lowercase().contains(&needle))
    else {
        return Ok(format!(
            "Couldn't find any item matching '{query}' in inventory"
        ));
    };
    let mut out = format!("Found {} {} in inventory", item.count, item.name);
    if let Some(slot) = item.slot {
        let _ = write!(out, " (slot {slot})");
    }
    Ok(out)
}

pub async fn equip_item(
    bot: &dyn Bot,
    item_name: &str,
    destination: EquipDestination,
) -> Result<String> {
    let needle = item_name.to_lowercase();
    let items = bot.inventory().await?;
    let item = items
        .iter()
        .find(|item| item.name.to_lowercase().contains(&needle))
        .ok_or_else(|| eyre!("Couldn't find any item matching '{item_name}' in inventory"))?;
    bot.equip(item, destination).await?;
    Ok(format!("Equipped {} to {destination}", item.name))
}

pub async fn place_block(bot: &dyn Bot, target: BlockPos, preferred: Face) -> Result<String> {
    let target = target.in_world()?;
    if let Some(existing) = bot.block_at(target).await? {
        if !existing.is_air() {
            return Ok(format!(
                "There's already a block ({}) at {target}",
                existing.name
            ));
        }
    }

    let faces = std::iter::once(preferred).chain(Face::ALL.into_iter().filter(|f| *f != preferred));
    for face in faces {
        let offset = face.vector();
        let reference = target - offset;
        let Some(block) = bot.block_at(reference).await? else {
            continue;
        };
        if block.is_air() {
            continue;
        }
        let attempt = match bot.look_at(target.center()).await {
            Ok(()) => bot.place_block(reference, offset).await,
            Err(err) => Err(err),
        };
        match attempt {
            Ok(()) => return Ok(format!("Placed block at {target} using {face} face")),
            Err(err) => {
                tracing::debug!(%reference, %face, "Placement attempt failed: {err:#}");
            }
        }
    }
    Err(eyre!(
        "Failed to place block at {target}: no suitable reference block"
    ))
}

pub async fn dig_block(bot: &dyn Bot, target: BlockPos) -> Result<String> {
    let block = match bot.block_at(target).await? {
        Some(block) if !block.is_air() => block,
        _ => return Ok(format!("No block found at position {target}")),
    };
    if !bot.can_dig(target).await? {
        return Ok(format!("Cannot dig {} at {target}", block.name));
    }
    bot.dig(target).await?;
    Ok(format!("Dug {} at {target}", block.name))
}

pub async fn get_block_info(bot: &dyn Bot, target: BlockPos) -> Result<String> {
    Ok(match bot.block_at(target).await? {
        Some(block) => format_block_info(&block),
        None => format!("No block information found at position {target}"),
    })
}

pub async fn find_block(bot: &dyn Bot, block_type: &str, max_distance: u32) -> Result<String> {
    Ok(match bot.find_block(block_type, max_distance).await? {
        Some(block) => format!("Found {} at position {}", block.name, block.position),
        None => format!("No {block_type} found within {max_distance} blocks"),
    })
}

pub async fn find_entity(bot: &dyn Bot, kind: Option<&str>, max_distance: f64) -> Result<String> {
    let here = bot.position().await?;
    let needle = kind.map(str::to_lowercase);
    let entities = bot.entities().await?;
    let nearest = entities
        .iter()
        .filter(|entity| match needle.as_deref() {
            None => true,
            Some("player") => entity.kind == "player",
            Some("mob") => entity.kind == "mob" || entity.kind == "hostile" || entity.kind == "animal",
            Some(needle) => entity
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle)),
        })
        .map(|entity| (entity, entity.position.distance_to(here)))
        .min_by(|a, b| a.1.total_cmp(&b.1));

    match nearest {
        Some((entity, distance)) if distance <= max_distance => Ok(format!(
            "Found {} at position {}, {distance:.1} blocks away",
            entity.label(),
            entity.position
        )),
        _ => Ok(format!(
            "No {} found within {max_distance} blocks",
            kind.unwrap_or("entity")
        )),
    }
}

pub async fn send_chat(bot: &dyn Bot, message: &str) -> Result<String> {
    bot.chat(message).await?;
    Ok(format!("Sent message: \"{message}\""))
}

pub fn read_chat(log: &ChatLog, count: usize) -> String {
    if log.is_empty() {
        return "No chat messages found".to_string();
    }
    let count = count.clamp(1, MAX_CHAT_COUNT);
    let entries: Vec<String> = log.recent(count).map(ToString::to_string).collect();
    format!(
        "Found {} chat message(s):\n\n{}",
        entries.len(),
        entries.join("\n")
    )
}

pub async fn detect_gamemode(bot: &dyn Bot) -> Result<String> {
    let mode = bot.game_mode().await?;
    Ok(format!("Bot gamemode: \"{mode}\""))
}
