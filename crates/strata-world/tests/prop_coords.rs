use proptest::prelude::*;
use strata_world::coords::{
    block_to_cube, block_to_local, cube_to_max_block, cube_to_min_block, local_to_block,
};
use strata_world::gen::{CubePrimer, primer_index};

fn block() -> impl Strategy<Value = i32> {
    -30_000_000i32..=30_000_000
}

proptest! {
    // Shift/mask coordinate math agrees with euclidean division everywhere,
    // including negative coordinates.
    #[test]
    fn cube_math_matches_euclidean_division(b in block()) {
        prop_assert_eq!(block_to_cube(b), b.div_euclid(16));
        prop_assert_eq!(block_to_local(b) as i32, b.rem_euclid(16));
    }

    // Splitting a block coordinate and putting it back is the identity.
    #[test]
    fn split_and_rejoin_round_trips(b in block()) {
        let c = block_to_cube(b);
        let l = block_to_local(b);
        prop_assert_eq!(local_to_block(c, l), b);
    }

    // Every block in a cube's [min, max] range maps back to that cube.
    #[test]
    fn bounds_cover_exactly_one_cube(c in -1_000_000i32..=1_000_000) {
        let min = cube_to_min_block(c);
        let max = cube_to_max_block(c);
        prop_assert_eq!(max - min, 15);
        prop_assert_eq!(block_to_cube(min), c);
        prop_assert_eq!(block_to_cube(max), c);
        prop_assert_eq!(block_to_cube(min - 1), c - 1);
        prop_assert_eq!(block_to_cube(max + 1), c + 1);
    }

    // The primer's packed index is a bijection onto [0, 4096).
    #[test]
    fn primer_index_bijective(x in 0usize..16, y in 0usize..16, z in 0usize..16,
                              x2 in 0usize..16, y2 in 0usize..16, z2 in 0usize..16) {
        let a = primer_index(x, y, z);
        let b = primer_index(x2, y2, z2);
        prop_assert!(a < 4096);
        prop_assert_eq!(a == b, (x, y, z) == (x2, y2, z2));
    }

    // Writes land where reads look, across the whole coordinate domain.
    #[test]
    fn primer_set_get_agree(x in 0usize..16, y in 0usize..16, z in 0usize..16, id in 1u16..100) {
        let mut primer = CubePrimer::new();
        primer.set(x, y, z, strata_blocks::Block::new(id));
        prop_assert_eq!(primer.get(x, y, z).id, id);
        let untouched = primer.blocks().iter().filter(|b| !b.is_air()).count();
        prop_assert_eq!(untouched, 1);
    }
}
