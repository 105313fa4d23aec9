use proptest::prelude::*;
use std::collections::BTreeSet;
use strata_height::{HeightIndex, ServerHeightMap};

#[derive(Clone, Debug)]
struct Write {
    x: usize,
    z: usize,
    y: i32,
    opacity: u8,
}

fn write_seq() -> impl Strategy<Value = Vec<Write>> {
    prop::collection::vec(
        (0usize..16, 0usize..16, -64i32..192, prop::bool::ANY).prop_map(|(x, z, y, opaque)| {
            Write {
                x,
                z,
                y,
                opacity: if opaque { 255 } else { 0 },
            }
        }),
        0..200,
    )
}

proptest! {
    // After any write sequence the index agrees with a brute-force model of
    // "max Y among opaque blocks seen so far" per cell.
    #[test]
    fn matches_brute_force_model(writes in write_seq()) {
        let mut hm = ServerHeightMap::new();
        let mut model: Vec<BTreeSet<i32>> = vec![BTreeSet::new(); 256];
        for w in &writes {
            hm.on_opacity_change(w.x, w.y, w.z, w.opacity);
            let cell = &mut model[(w.z << 4) | w.x];
            if w.opacity > 0 {
                cell.insert(w.y);
            } else {
                cell.remove(&w.y);
            }
        }
        for z in 0..16usize {
            for x in 0..16usize {
                let cell = &model[(z << 4) | x];
                prop_assert_eq!(hm.top_block_y(x, z), cell.iter().next_back().copied());
                // Spot-check the strictly-below query at a few pivots.
                for pivot in [-64i32, -1, 0, 63, 192] {
                    let expect = cell.range(..pivot).next_back().copied();
                    prop_assert_eq!(hm.top_block_y_below(x, z, pivot), expect);
                }
            }
        }
        let expect_lowest = model
            .iter()
            .filter_map(|c| c.iter().next_back().copied())
            .min();
        prop_assert_eq!(hm.lowest_top_y(), expect_lowest);
    }

    // Serialization is lossless for arbitrary write sequences.
    #[test]
    fn bytes_round_trip(writes in write_seq()) {
        let mut hm = ServerHeightMap::new();
        for w in &writes {
            hm.on_opacity_change(w.x, w.y, w.z, w.opacity);
        }
        let bytes = hm.to_bytes();
        let back = ServerHeightMap::from_bytes(&bytes);
        prop_assert!(back.is_some());
        prop_assert_eq!(back.unwrap().to_bytes(), bytes);
    }
}
