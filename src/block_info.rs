use crate::bot::Block;
use std::fmt::Write;

/// Multi-line description of a block, listing only the properties the runtime reported.
pub fn format_block_info(block: &Block) -> String {
    let mut out = format!("Block at {}:\nName: {}", block.position, block.name);
    // Writing to a String cannot fail.
    if let Some(display_name) = &block.display_name {
        let _ = write!(out, "\nDisplay name: {display_name}");
    }
    if let Some(type_id) = block.type_id {
        let _ = write!(out, "\nType ID: {type_id}");
    }
    if let Some(metadata) = block.metadata {
        let _ = write!(out, "\nMetadata: {metadata}");
    }
    if let Some(hardness) = block.hardness {
        let _ = write!(out, "\nHardness: {hardness}");
    }
    if let Some(diggable) = block.diggable {
        let _ = write!(out, "\nDiggable: {}", yes_no(diggable));
    }
    if let Some(transparent) = block.transparent {
        let _ = write!(out, "\nTransparent: {}", yes_no(transparent));
    }
    if let Some(material) = &block.material {
        let _ = write!(out, "\nMaterial: {material}");
    }
    if let Some(bounding_box) = &block.bounding_box {
        let _ = write!(out, "\nBounding box: {bounding_box}");
    }
    if let Some(biome) = &block.biome {
        let _ = write!(out, "\nBiome: {biome}");
    }
    match (block.light, block.sky_light) {
        (Some(light), Some(sky)) => {
            let _ = write!(out, "\nLight: {light} (sky {sky})");
        }
        (Some(light), None) => {
            let _ = write!(out, "\nLight: {light}");
        }
        (None, Some(sky)) => {
            let _ = write!(out, "\nSky light: {sky}");
        }
        (None, None) => {}
    }
    if !block.harvest_tools.is_empty() {
        let _ = write!(out, "\nHarvest tools: {}", block.harvest_tools.join(", "));
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::BlockPos;

    #[test]
    fn bare_block_prints_name_and_position_only() {
        let block = Block::new("stone", BlockPos::new(1, 2, 3));
        assert_eq!(format_block_info(&block), "Block at (1, 2, 3):\nName: stone");
    }

    #[test]
    fn present_properties_are_listed_in_order() {
        let block = Block {
            name: "iron_ore".to_string(),
            position: BlockPos::new(-4, 12, 9),
            display_name: Some("Iron Ore".to_string()),
            type_id: Some(15),
            hardness: Some(3.0),
            diggable: Some(true),
            transparent: Some(false),
            material: Some("mineable/pickaxe".to_string()),
            light: Some(0),
            sky_light: Some(15),
            harvest_tools: vec!["stone_pickaxe".to_string(), "iron_pickaxe".to_string()],
            ..Default::default()
        };
        let text = format_block_info(&block);
        assert_eq!(
            text,
            "Block at (-4, 12, 9):\n\
             Name: iron_ore\n\
             Display name: Iron Ore\n\
             Type ID: 15\n\
             Hardness: 3\n\
             Diggable: yes\n\
             Transparent: no\n\
             Material: mineable/pickaxe\n\
             Light: 0 (sky 15)\n\
             Harvest tools: stone_pickaxe, iron_pickaxe"
        );
    }

    #[test]
    fn sky_light_alone_is_labelled() {
        let block = Block {
            sky_light: Some(7),
            ..Block::new("glass", BlockPos::new(0, 70, 0))
        };
        assert!(format_block_info(&block).ends_with("\nSky light: 7"));
    }
}
