use proptest::prelude::*;
use sling_resolver_core::mapping::iter::{MapEntryIterator, ResolveMaps};
use sling_resolver_core::mapping::{Direction, GLOBAL_LIST_KEY, MapEntry, Mapping};
use std::sync::Arc;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}"
}

fn path(max_segments: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..=max_segments).prop_map(|segments| format!("/{}", segments.join("/")))
}

proptest! {
    #[test]
    fn mapping_round_trips(from in path(3), to in path(3), rest in path(4)) {
        let mapping = Mapping::new(from.clone(), to, Direction::Both);
        let handle = format!("{from}{rest}");

        let external = mapping.map_handle(&handle).unwrap();
        prop_assert_eq!(mapping.map_uri(&external), Some(handle));
    }

    #[test]
    fn one_way_mappings_do_not_round_trip(from in path(2), to in path(2), rest in path(2)) {
        let outbound = Mapping::new(from.clone(), to.clone(), Direction::Outbound);
        let inbound = Mapping::new(from.clone(), to, Direction::Inbound);
        let handle = format!("{from}{rest}");

        prop_assert!(outbound.map_uri(&handle).is_none());
        prop_assert!(inbound.map_handle(&handle).is_none());
    }

    #[test]
    fn longer_patterns_come_first(short in segment(), extra in segment(), order in 0i64..1000) {
        let long = format!("{short}{extra}");
        let short_entry = MapEntry::new(&format!("^http/localhost.80/{short}"), -1, false, order, vec!["/s".to_string()]).unwrap();
        let long_entry = MapEntry::new(&format!("^http/localhost.80/{long}"), -1, false, 0, vec!["/l".to_string()]).unwrap();

        let mut global = vec![short_entry, long_entry];
        global.sort();
        let maps = ResolveMaps::new();
        maps.insert(GLOBAL_LIST_KEY.to_string(), Arc::new(global));

        let walked: Vec<String> = MapEntryIterator::new("http/localhost.80/x", Arc::new(maps), false)
            .map(|e| e.redirect()[0].clone())
            .collect();
        prop_assert_eq!(walked, vec!["/l".to_string(), "/s".to_string()]);
    }

    #[test]
    fn longer_patterns_win_across_lists(short in segment(), extra in segment(), long_is_global in any::<bool>()) {
        let long = format!("{short}{extra}");
        let short_entry = MapEntry::new(&format!("^http/localhost.80/{short}"), -1, false, 0, vec!["/s".to_string()]).unwrap();
        let long_entry = MapEntry::new(&format!("^http/localhost.80/{long}"), -1, false, 0, vec!["/l".to_string()]).unwrap();
        let (global, special) = if long_is_global {
            (long_entry, short_entry)
        } else {
            (short_entry, long_entry)
        };

        let maps = ResolveMaps::new();
        maps.insert(GLOBAL_LIST_KEY.to_string(), Arc::new(vec![global]));
        maps.insert("/x".to_string(), Arc::new(vec![special]));

        let walked: Vec<String> = MapEntryIterator::new("http/localhost.80/x", Arc::new(maps), false)
            .map(|e| e.redirect()[0].clone())
            .collect();
        prop_assert_eq!(walked, vec!["/l".to_string(), "/s".to_string()]);
    }
}
