use std::fs::{self, OpenOptions};

use strata_blocks::BlockRegistry;
use strata_cube::{Column, Cube, EntityRecord};
use strata_height::HeightIndex;
use strata_store::{CubeStore, RegionLog, StoreConfig};
use strata_world::gen::CubePrimer;
use strata_world::{ColumnPos, CubePos};

fn sample_cube(reg: &BlockRegistry, pos: CubePos) -> Cube {
    let mut primer = CubePrimer::new();
    primer.set(1, 2, 3, reg.block_by_name("stone"));
    primer.set(4, 5, 6, reg.block_by_name("dirt"));
    let (mut cube, _) = Cube::from_primer(pos, primer);
    cube.add_entity(EntityRecord {
        id: 1,
        kind: "bat".into(),
        pos: [0.5, 1.0, 0.5],
    });
    cube
}

#[test]
fn save_flush_reopen_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let reg = BlockRegistry::builtin();
    let pos = CubePos::new(3, -2, 14);
    let cube = sample_cube(&reg, pos);

    let mut column = Column::new(ColumnPos::new(3, 14));
    let stone = reg.block_by_name("stone");
    let mut primer = CubePrimer::new();
    primer.set(0, 7, 0, stone);
    let (hcube, _) = Cube::from_primer(CubePos::new(3, 0, 14), primer);
    column.insert_cube(&reg, hcube);

    {
        let mut store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();
        store.save_cube(&cube).unwrap();
        store.save_column(&column).unwrap();
        store.flush();
        assert_eq!(store.pending_cube_count(), 0);
        assert_eq!(store.pending_column_count(), 0);
        store.close().unwrap();
        // Idempotent close.
        store.close().unwrap();
    }

    let store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();
    let loaded = store.load_cube(pos).expect("cube persisted");
    assert_eq!(loaded.blocks(), cube.blocks());
    assert_eq!(loaded.entities(), cube.entities());
    assert!(!loaded.is_dirty());

    let loaded_col = store.load_column(ColumnPos::new(3, 14)).expect("column persisted");
    assert_eq!(loaded_col.height().top_block_y(0, 0), Some(7));
    assert!(store.cube_exists(pos));
    assert!(store.column_exists(ColumnPos::new(3, 14)));
    assert!(!store.cube_exists(CubePos::new(9, 9, 9)));
}

#[test]
fn reads_see_unflushed_saves() {
    let dir = tempfile::tempdir().unwrap();
    let reg = BlockRegistry::builtin();
    let pos = CubePos::new(0, 0, 0);
    let store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();
    store.save_cube(&sample_cube(&reg, pos)).unwrap();
    // No flush: the pending queue / saved cache must serve the read.
    let loaded = store.load_cube(pos).expect("read-after-write");
    assert_eq!(loaded.pos(), pos);
}

#[test]
fn later_saves_win() {
    let dir = tempfile::tempdir().unwrap();
    let reg = BlockRegistry::builtin();
    let pos = CubePos::new(1, 1, 1);
    let store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();

    let first = sample_cube(&reg, pos);
    store.save_cube(&first).unwrap();
    let mut second = sample_cube(&reg, pos);
    second.set_block(9, 9, 9, reg.block_by_name("gravel"));
    store.save_cube(&second).unwrap();
    store.flush();

    let loaded = store.load_cube(pos).unwrap();
    assert_eq!(loaded.block(9, 9, 9), reg.block_by_name("gravel"));
}

#[test]
fn read_only_mode_drops_saves() {
    let dir = tempfile::tempdir().unwrap();
    let reg = BlockRegistry::builtin();
    let pos = CubePos::new(5, 5, 5);
    {
        let store = CubeStore::open(
            dir.path(),
            StoreConfig { read_only: true },
        )
        .unwrap();
        store.save_cube(&sample_cube(&reg, pos)).unwrap();
        store.flush();
    }
    let store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();
    assert!(store.load_cube(pos).is_none());
}

#[test]
fn corrupt_records_read_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let pos = CubePos::new(2, 2, 2);
    {
        let mut log = RegionLog::open(dir.path().join("region3d").join("cubes.log")).unwrap();
        log.write_batch(&[(strata_store::cube_key(pos).to_vec(), b"garbage".to_vec())])
            .unwrap();
    }
    let store = CubeStore::open(dir.path(), StoreConfig::default()).unwrap();
    assert!(store.cube_exists(pos));
    assert!(store.load_cube(pos).is_none());
}

#[test]
fn torn_tail_batch_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log");
    let batch1: Vec<(Vec<u8>, Vec<u8>)> = (0..5u8)
        .map(|i| (vec![1, i], vec![i; 32]))
        .collect();
    let batch2: Vec<(Vec<u8>, Vec<u8>)> = (0..5u8)
        .map(|i| (vec![2, i], vec![i ^ 0xff; 32]))
        .collect();
    {
        let mut log = RegionLog::open(&path).unwrap();
        log.write_batch(&batch1).unwrap();
        log.write_batch(&batch2).unwrap();
    }
    // Chop a few bytes off the second frame: a simulated crash mid-batch.
    let len = fs::metadata(&path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let mut log = RegionLog::open(&path).unwrap();
    for (key, value) in &batch1 {
        assert_eq!(log.get(key).unwrap().as_ref(), Some(value));
    }
    // Nothing from the torn batch survives, not even its early records.
    for (key, _) in &batch2 {
        assert_eq!(log.get(key).unwrap(), None);
    }
    // The log stays writable after recovery.
    log.write_batch(&[(b"k".to_vec(), b"v".to_vec())]).unwrap();
    drop(log);
    let mut log = RegionLog::open(&path).unwrap();
    assert_eq!(log.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn overwrites_within_and_across_batches_take_the_newest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log");
    let mut log = RegionLog::open(&path).unwrap();
    log.write_batch(&[(b"a".to_vec(), b"1".to_vec())]).unwrap();
    log.write_batch(&[
        (b"a".to_vec(), b"2".to_vec()),
        (b"b".to_vec(), b"x".to_vec()),
    ])
    .unwrap();
    assert_eq!(log.get(b"a").unwrap(), Some(b"2".to_vec()));
    drop(log);
    let mut log = RegionLog::open(&path).unwrap();
    assert_eq!(log.get(b"a").unwrap(), Some(b"2".to_vec()));
    assert_eq!(log.get(b"b").unwrap(), Some(b"x".to_vec()));
    assert_eq!(log.len(), 2);
}
