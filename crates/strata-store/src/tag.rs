//! Versioned tag-tree snapshots for cubes and columns, zlib-compressed on
//! the wire.

use std::io::{Read, Write};

use fastnbt::{ByteArray, IntArray};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use strata_blocks::Block;
use strata_cube::{Column, Cube, EntityRecord};
use strata_height::ServerHeightMap;
use strata_world::{ColumnPos, CubePos};

use crate::StoreError;

pub const DATA_VERSION: i32 = 1;

#[derive(Serialize, Deserialize)]
struct CubeTag {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    x: i32,
    y: i32,
    z: i32,
    populated: i8,
    /// One i32 per voxel in primer order: block id in the high 16 bits,
    /// state in the low 16.
    blocks: IntArray,
    entities: Vec<EntityTag>,
}

#[derive(Serialize, Deserialize)]
struct EntityTag {
    id: i64,
    kind: String,
    pos: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct ColumnTag {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    x: i32,
    z: i32,
    is_cubic: i8,
    biomes: ByteArray,
    heightmap: ByteArray,
}

fn compress(nbt: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(nbt)?;
    Ok(enc.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

pub fn encode_cube(cube: &Cube) -> Result<Vec<u8>, StoreError> {
    let pos = cube.pos();
    let blocks: Vec<i32> = cube
        .blocks()
        .iter()
        .map(|b| (((b.id as u32) << 16) | b.state as u32) as i32)
        .collect();
    let entities = cube
        .entities()
        .iter()
        .map(|e| EntityTag {
            id: e.id as i64,
            kind: e.kind.clone(),
            pos: e.pos.to_vec(),
        })
        .collect();
    let tag = CubeTag {
        data_version: DATA_VERSION,
        x: pos.x,
        y: pos.y,
        z: pos.z,
        populated: cube.is_populated() as i8,
        blocks: IntArray::new(blocks),
        entities,
    };
    compress(&fastnbt::to_bytes(&tag)?)
}

pub fn decode_cube(data: &[u8]) -> Result<Cube, StoreError> {
    let tag: CubeTag = fastnbt::from_bytes(&decompress(data)?)?;
    if tag.data_version != DATA_VERSION {
        return Err(StoreError::Version(tag.data_version));
    }
    let blocks: Vec<Block> = tag
        .blocks
        .iter()
        .map(|&packed| {
            let packed = packed as u32;
            Block {
                id: (packed >> 16) as u16,
                state: (packed & 0xffff) as u16,
            }
        })
        .collect();
    if blocks.len() != 16 * 16 * 16 {
        return Err(StoreError::Corrupt(format!(
            "cube record holds {} voxels",
            blocks.len()
        )));
    }
    let entities = tag
        .entities
        .into_iter()
        .map(|e| {
            if e.pos.len() != 3 {
                return Err(StoreError::Corrupt("entity position arity".into()));
            }
            Ok(EntityRecord {
                id: e.id as u64,
                kind: e.kind,
                pos: [e.pos[0], e.pos[1], e.pos[2]],
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Cube::from_parts(
        CubePos::new(tag.x, tag.y, tag.z),
        blocks,
        entities,
        tag.populated != 0,
    ))
}

pub fn encode_column(column: &Column) -> Result<Vec<u8>, StoreError> {
    let pos = column.pos();
    let tag = ColumnTag {
        data_version: DATA_VERSION,
        x: pos.x,
        z: pos.z,
        is_cubic: column.is_cubic() as i8,
        biomes: ByteArray::new(column.biomes().iter().map(|&b| b as i8).collect()),
        heightmap: ByteArray::new(
            column
                .height()
                .to_bytes()
                .into_iter()
                .map(|b| b as i8)
                .collect(),
        ),
    };
    compress(&fastnbt::to_bytes(&tag)?)
}

pub fn decode_column(data: &[u8]) -> Result<Column, StoreError> {
    let tag: ColumnTag = fastnbt::from_bytes(&decompress(data)?)?;
    if tag.data_version != DATA_VERSION {
        return Err(StoreError::Version(tag.data_version));
    }
    let biome_bytes: Vec<u8> = tag.biomes.iter().map(|&b| b as u8).collect();
    if biome_bytes.len() != 256 {
        return Err(StoreError::Corrupt(format!(
            "column record holds {} biome entries",
            biome_bytes.len()
        )));
    }
    let mut biomes = [0u8; 256];
    biomes.copy_from_slice(&biome_bytes);
    let height_bytes: Vec<u8> = tag.heightmap.iter().map(|&b| b as u8).collect();
    let height = ServerHeightMap::from_bytes(&height_bytes)
        .ok_or_else(|| StoreError::Corrupt("height index payload".into()))?;
    Ok(Column::from_parts(
        ColumnPos::new(tag.x, tag.z),
        height,
        biomes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_blocks::BlockRegistry;
    use strata_height::HeightIndex;
    use strata_world::gen::CubePrimer;

    #[test]
    fn cube_round_trip() {
        let mut primer = CubePrimer::new();
        primer.set(0, 0, 0, Block { id: 7, state: 3 });
        primer.set(15, 15, 15, Block::new(1));
        let (mut cube, _) = Cube::from_primer(CubePos::new(-5, 12, 9), primer);
        cube.mark_populated();
        cube.add_entity(EntityRecord {
            id: 99,
            kind: "bat".into(),
            pos: [1.5, 2.0, -3.25],
        });
        let bytes = encode_cube(&cube).unwrap();
        let back = decode_cube(&bytes).unwrap();
        assert_eq!(back.pos(), cube.pos());
        assert_eq!(back.blocks(), cube.blocks());
        assert_eq!(back.entities(), cube.entities());
        assert!(back.is_populated());
        // Loaded data starts clean.
        assert!(!back.is_dirty());
    }

    #[test]
    fn column_round_trip_preserves_height_index() {
        let reg = BlockRegistry::builtin();
        let mut column = Column::new(ColumnPos::new(3, -14));
        let mut biomes = [0u8; 256];
        biomes[17] = 2;
        column.set_biomes(biomes);
        let mut primer = CubePrimer::new();
        primer.set(4, 9, 6, reg.block_by_name("stone"));
        let (cube, _) = Cube::from_primer(CubePos::new(3, 0, -14), primer);
        column.insert_cube(&reg, cube);

        let bytes = encode_column(&column).unwrap();
        let back = decode_column(&bytes).unwrap();
        assert_eq!(back.pos(), column.pos());
        assert_eq!(back.biomes(), column.biomes());
        assert_eq!(back.height().top_block_y(4, 6), Some(9));
        assert_eq!(back.height().to_bytes(), column.height().to_bytes());
    }

    #[test]
    fn future_versions_are_rejected_not_misread() {
        let mut cube_bytes = Vec::new();
        {
            let (cube, _) = Cube::from_primer(CubePos::new(0, 0, 0), CubePrimer::new());
            cube_bytes.extend(encode_cube(&cube).unwrap());
        }
        // Corrupt the stream entirely: not zlib at all.
        assert!(decode_cube(b"not a record").is_err());
        assert!(decode_cube(&cube_bytes).is_ok());
    }
}
