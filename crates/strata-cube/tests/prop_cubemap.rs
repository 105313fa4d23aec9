use proptest::prelude::*;
use std::collections::BTreeSet;
use strata_cube::{Cube, CubeMap};
use strata_world::CubePos;
use strata_world::gen::CubePrimer;

#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    Remove(i32),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        (-32i32..32, prop::bool::ANY).prop_map(|(cy, insert)| {
            if insert {
                Op::Insert(cy)
            } else {
                Op::Remove(cy)
            }
        }),
        0..100,
    )
}

proptest! {
    // The arena-backed map behaves like a plain ordered set of Ys under any
    // insert/remove sequence.
    #[test]
    fn behaves_like_an_ordered_set(ops in ops()) {
        let mut map = CubeMap::new();
        let mut model = BTreeSet::new();
        for op in ops {
            match op {
                Op::Insert(cy) => {
                    if !model.contains(&cy) {
                        let (cube, _) =
                            Cube::from_primer(CubePos::new(0, cy, 0), CubePrimer::new());
                        map.insert(cube);
                        model.insert(cy);
                    }
                }
                Op::Remove(cy) => {
                    prop_assert_eq!(map.remove(cy).is_some(), model.remove(&cy));
                }
            }
        }
        prop_assert_eq!(map.len(), model.len());
        let ys: Vec<i32> = map.iter().map(|c| c.pos().y).collect();
        let expect: Vec<i32> = model.iter().copied().collect();
        prop_assert_eq!(ys, expect);
        for cy in -32..32 {
            prop_assert_eq!(map.get_loaded(cy).is_some(), model.contains(&cy));
            prop_assert_eq!(map.get(cy).is_resident(), model.contains(&cy));
        }
        // Range queries match the model's ranges, ascending.
        let got: Vec<i32> = map.cubes(-8..=8).map(|c| c.pos().y).collect();
        let expect: Vec<i32> = model.range(-8..=8).copied().collect();
        prop_assert_eq!(got, expect);
    }

    // Every cube remains reachable at its own Y after arbitrary removals
    // (the arena swap keeps indices straight).
    #[test]
    fn cubes_stay_addressed_by_their_y(mut ys in prop::collection::btree_set(-64i32..64, 1..40),
                                       victim_seed in 0usize..40) {
        let mut map = CubeMap::new();
        for &cy in &ys {
            let (cube, _) = Cube::from_primer(CubePos::new(0, cy, 0), CubePrimer::new());
            map.insert(cube);
        }
        let victims: Vec<i32> = ys.iter().copied().take(victim_seed % ys.len() + 1).collect();
        for v in victims {
            map.remove(v);
            ys.remove(&v);
        }
        for &cy in &ys {
            let cube = map.get_loaded(cy);
            prop_assert!(cube.is_some());
            prop_assert_eq!(cube.unwrap().pos().y, cy);
        }
    }
}
