use strata_world::{ColumnPos, CubePos};

/// 8-byte column key: big-endian X then Z.
pub fn column_key(pos: ColumnPos) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[0..4].copy_from_slice(&pos.x.to_be_bytes());
    key[4..8].copy_from_slice(&pos.z.to_be_bytes());
    key
}

/// 12-byte cube key: big-endian Y, X, Z. Y leads so cubes of one altitude
/// band cluster together in key order.
pub fn cube_key(pos: CubePos) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[0..4].copy_from_slice(&pos.y.to_be_bytes());
    key[4..8].copy_from_slice(&pos.x.to_be_bytes());
    key[8..12].copy_from_slice(&pos.z.to_be_bytes());
    key
}
