//! Small shared helpers.

use std::collections::BTreeMap;

/// Lowest id not present in the map. Freed ids are reused before the
/// counter grows.
pub(crate) fn lowest_free_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    let mut expected = 0;
    for id in map.keys() {
        if *id != expected {
            break;
        }
        expected += 1;
    }
    expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_map_starts_at_zero() {
        let map: BTreeMap<u32, ()> = BTreeMap::new();
        assert_eq!(lowest_free_id(&map), 0);
    }

    #[test]
    fn gaps_are_reused() {
        let mut map = BTreeMap::new();
        map.insert(0, ());
        map.insert(1, ());
        map.insert(3, ());
        assert_eq!(lowest_free_id(&map), 2);

        map.insert(2, ());
        assert_eq!(lowest_free_id(&map), 4);

        map.remove(&0);
        assert_eq!(lowest_free_id(&map), 0);
    }
}
