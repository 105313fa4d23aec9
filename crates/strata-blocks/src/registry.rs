use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use super::config::{BlocksConfig, builtin_blocks};
use super::types::{Block, BlockId, BlockType};

#[derive(Default, Clone, Debug)]
pub struct BlockRegistry {
    pub blocks: Vec<BlockType>,
    pub by_name: HashMap<String, BlockId>,
    pub unknown_block_id: Option<BlockId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            by_name: HashMap::new(),
            unknown_block_id: None,
        }
    }

    /// Registry with the built-in block set; enough for worlds that don't
    /// ship a blocks.toml.
    pub fn builtin() -> Self {
        Self::from_config(builtin_blocks()).unwrap_or_default()
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Resolve a configured block name, falling back to the registry's
    /// unknown block (and ultimately air) for names that don't exist.
    pub fn block_by_name(&self, name: &str) -> Block {
        match self.id_by_name(name).or(self.unknown_block_id) {
            Some(id) => Block::new(id),
            None => Block::AIR,
        }
    }

    #[inline]
    pub fn opacity(&self, b: Block) -> u8 {
        self.get(b.id).map(|ty| ty.opacity).unwrap_or(0)
    }

    #[inline]
    pub fn is_solid(&self, b: Block) -> bool {
        self.get(b.id).map(|ty| ty.solid).unwrap_or(false)
    }

    #[inline]
    pub fn is_liquid(&self, b: Block) -> bool {
        self.get(b.id).map(|ty| ty.liquid).unwrap_or(false)
    }

    pub fn load_from_path(blocks_path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let blocks_toml = fs::read_to_string(blocks_path)?;
        let cfg: BlocksConfig = toml::from_str(&blocks_toml)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, Box<dyn Error>> {
        let mut reg = BlockRegistry::new();
        let unknown_name = cfg.unknown_block.clone();
        for def in cfg.blocks.into_iter() {
            let id = def.id.unwrap_or(reg.blocks.len() as u16);
            let solid = def.solid.unwrap_or(true);
            let ty = BlockType {
                id,
                name: def.name,
                solid,
                opacity: def.opacity.unwrap_or(if solid { 255 } else { 0 }),
                emission: def.emission.unwrap_or(0),
                liquid: def.liquid.unwrap_or(false),
            };
            if reg.blocks.len() <= id as usize {
                reg.blocks
                    .resize(id as usize + 1, BlockType::placeholder(id));
            }
            reg.blocks[id as usize] = ty;
        }
        reg.by_name = reg.blocks.iter().map(|t| (t.name.clone(), t.id)).collect();
        if let Some(name) = unknown_name {
            reg.unknown_block_id = reg.id_by_name(&name);
        }
        Ok(reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_air_at_zero() {
        let reg = BlockRegistry::builtin();
        assert_eq!(reg.id_by_name("air"), Some(0));
        assert_eq!(reg.opacity(Block::AIR), 0);
        assert!(reg.is_solid(reg.block_by_name("stone")));
    }

    #[test]
    fn unknown_names_fall_back() {
        let reg = BlockRegistry::builtin();
        let b = reg.block_by_name("no_such_block");
        assert_eq!(Some(b.id), reg.unknown_block_id);
    }

    #[test]
    fn explicit_ids_leave_gaps_as_placeholders() {
        let cfg: BlocksConfig = toml::from_str(
            r#"
            [[blocks]]
            name = "air"
            solid = false
            [[blocks]]
            name = "late"
            id = 5
            "#,
        )
        .unwrap();
        let reg = BlockRegistry::from_config(cfg).unwrap();
        assert_eq!(reg.id_by_name("late"), Some(5));
        assert_eq!(reg.blocks.len(), 6);
        assert!(!reg.is_solid(Block::new(3)));
    }
}
