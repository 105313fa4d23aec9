pub type BlockId = u16;
pub type BlockState = u16;

/// Runtime block value stored per voxel. Cheap to copy, compared by value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Block {
    pub id: BlockId,
    pub state: BlockState,
}

impl Block {
    pub const AIR: Block = Block { id: 0, state: 0 };

    #[inline]
    pub const fn new(id: BlockId) -> Self {
        Self { id, state: 0 }
    }

    #[inline]
    pub fn is_air(self) -> bool {
        self.id == 0
    }
}

/// Compiled per-type metadata the engine consults on every block write.
#[derive(Clone, Debug)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    pub solid: bool,
    /// Light opacity in [0, 255]. Anything above zero contributes to the
    /// column height index.
    pub opacity: u8,
    pub emission: u8,
    /// Liquids are solid for density purposes but never occlude the surface
    /// replacers the way stone does.
    pub liquid: bool,
}

impl BlockType {
    pub(crate) fn placeholder(id: BlockId) -> Self {
        Self {
            id,
            name: format!("unknown_{id}"),
            solid: false,
            opacity: 0,
            emission: 0,
            liquid: false,
        }
    }
}
