use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BlocksConfig {
    #[serde(default)]
    pub unknown_block: Option<String>,
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    #[serde(default)]
    pub solid: Option<bool>,
    #[serde(default)]
    pub opacity: Option<u8>,
    #[serde(default)]
    pub emission: Option<u8>,
    #[serde(default)]
    pub liquid: Option<bool>,
}

impl BlockDef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
            solid: None,
            opacity: None,
            emission: None,
            liquid: None,
        }
    }
}

/// Built-in block set used when no blocks.toml is provided. Ids are assigned
/// in declaration order, so `air` is always id 0.
pub fn builtin_blocks() -> BlocksConfig {
    fn def(name: &str, solid: bool, opacity: u8) -> BlockDef {
        BlockDef {
            solid: Some(solid),
            opacity: Some(opacity),
            ..BlockDef::named(name)
        }
    }
    let mut blocks = vec![
        def("air", false, 0),
        def("stone", true, 255),
        def("dirt", true, 255),
        def("grass", true, 255),
        def("sand", true, 255),
        def("gravel", true, 255),
        def("bedrock", true, 255),
        def("barrier", true, 255),
        def("cobblestone", true, 255),
        def("stone_bricks", true, 255),
        def("tall_grass", false, 0),
        def("flower", false, 0),
        def("mossy_cobblestone", true, 255),
        def("coal_ore", true, 255),
        def("iron_ore", true, 255),
        def("gold_ore", true, 255),
        def("redstone_ore", true, 255),
        def("diamond_ore", true, 255),
        def("snow", true, 255),
    ];
    blocks.push(BlockDef {
        liquid: Some(true),
        opacity: Some(3),
        solid: Some(false),
        ..BlockDef::named("water")
    });
    blocks.push(BlockDef {
        liquid: Some(true),
        opacity: Some(255),
        solid: Some(false),
        emission: Some(15),
        ..BlockDef::named("lava")
    });
    BlocksConfig {
        unknown_block: Some("stone".to_string()),
        blocks,
    }
}
