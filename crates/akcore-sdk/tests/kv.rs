//! KV capability tests against the mock host.

use std::collections::BTreeSet;

use akcore_sdk::borsh::{BorshDeserialize, BorshSerialize};
use akcore_sdk::{Bus, BusError, ExternalMessageType};
use akcore_test::{MockHost, init_test_logging};
use serde::{Deserialize, Serialize};

fn setup() -> (MockHost, Bus<MockHost>) {
    init_test_logging();
    let host = MockHost::new();
    let bus = Bus::new(host.clone());
    (host, bus)
}

fn assert_no_leaks(host: &MockHost) {
    assert_eq!(host.live_regions(), 0, "regions leaked");
    assert_eq!(host.invalid_frees(), 0, "region released twice");
    assert_eq!(host.allocations(), host.frees());
}

#[test]
fn test_set_get_delete() {
    let (host, bus) = setup();
    let key = b"test-key";
    let value = b"test-value";

    assert!(matches!(bus.kv_get(key), Err(BusError::NotFound)));

    bus.kv_set(key, value).unwrap();
    assert_eq!(bus.kv_get(key).unwrap(), value);

    bus.kv_delete(key).unwrap();
    assert!(matches!(bus.kv_get(key), Err(BusError::NotFound)));

    assert_no_leaks(&host);
}

#[test]
fn test_set_overwrites() {
    let (host, bus) = setup();
    bus.kv_set("k", b"one").unwrap();
    bus.kv_set("k", b"two").unwrap();
    assert_eq!(bus.kv_get("k").unwrap(), b"two");
    assert_eq!(host.get_kv("k").unwrap(), b"two");
}

#[test]
fn test_empty_value_is_not_absent() {
    let (_host, bus) = setup();
    bus.kv_set("empty", b"").unwrap();
    assert_eq!(bus.kv_get("empty").unwrap(), Vec::<u8>::new());
}

#[test]
fn test_delete_is_idempotent() {
    let (host, bus) = setup();
    bus.kv_delete("never-set").unwrap();
    bus.kv_set("k", b"v").unwrap();
    bus.kv_delete("k").unwrap();
    bus.kv_delete("k").unwrap();
    assert!(host.kv_keys().is_empty());
}

#[test]
fn test_delete_tolerates_not_found_reply() {
    init_test_logging();
    let host = MockHost::new().with_handler(ExternalMessageType::KvDeleteReq, |msg| {
        msg.default_reply()
            .with_error(akcore_sdk::Error::new(akcore_sdk::CommonErrorCode::NotFound))
    });
    let bus = Bus::new(host);
    bus.kv_delete("k").unwrap();
}

fn seed_ab(bus: &Bus<MockHost>) {
    for i in 0..4 {
        bus.kv_set(format!("a{i}"), b"test-value").unwrap();
        bus.kv_set(format!("b{i}"), b"test-value").unwrap();
    }
}

#[test]
fn test_list_page_from_offset() {
    let (host, bus) = setup();
    seed_ab(&bus);

    let resp = bus.kv_list("b", 2, 1).unwrap();
    assert_eq!(resp.total_matches, 4);
    assert_eq!(resp.keys, vec![b"b1".to_vec(), b"b2".to_vec()]);

    assert_no_leaks(&host);
}

#[test]
fn test_list_zero_limit_returns_all() {
    let (_host, bus) = setup();
    seed_ab(&bus);

    let resp = bus.kv_list("a", 0, 0).unwrap();
    assert_eq!(resp.total_matches, 4);
    assert_eq!(resp.keys.len(), 4);
}

#[test]
fn test_list_empty_prefix_matches_everything_in_order() {
    let (_host, bus) = setup();
    seed_ab(&bus);

    let resp = bus.kv_list("", 0, 0).unwrap();
    assert_eq!(resp.total_matches, 8);
    let mut sorted = resp.keys.clone();
    sorted.sort();
    assert_eq!(resp.keys, sorted);
}

#[test]
fn test_list_offset_past_end_is_empty() {
    let (_host, bus) = setup();
    seed_ab(&bus);

    for offset in [4, 5, 100] {
        let resp = bus.kv_list("b", 2, offset).unwrap();
        assert_eq!(resp.total_matches, 4);
        assert!(resp.keys.is_empty());
    }
}

#[test]
fn test_list_limit_bounds_page() {
    let (_host, bus) = setup();
    seed_ab(&bus);

    for limit in 1..=5 {
        let resp = bus.kv_list("", limit, 0).unwrap();
        assert!(resp.keys.len() <= limit as usize);
    }
}

#[test]
fn test_manual_pagination_covers_all_matches() {
    let (_host, bus) = setup();
    for i in 0..11 {
        bus.kv_set(format!("item/{i:02}"), b"x").unwrap();
    }
    bus.kv_set("other", b"x").unwrap();

    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let resp = bus.kv_list("item/", 3, offset).unwrap();
        assert_eq!(resp.total_matches, 11);
        offset += u32::try_from(resp.keys.len()).unwrap();
        seen.extend(resp.keys);
        if offset >= resp.total_matches {
            break;
        }
    }

    let expected: Vec<Vec<u8>> = (0..11).map(|i| format!("item/{i:02}").into_bytes()).collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_list_all_iterates_without_gaps_or_duplicates() {
    let (host, bus) = setup();
    seed_ab(&bus);

    for page_size in [0, 1, 2, 3, 4, 7] {
        let keys: Vec<Vec<u8>> = bus
            .kv_list_all("a", page_size)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            keys,
            vec![b"a0".to_vec(), b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec()],
            "page size {page_size}"
        );
        let unique: BTreeSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    assert_no_leaks(&host);
}

#[test]
fn test_list_all_with_no_matches() {
    let (_host, bus) = setup();
    seed_ab(&bus);
    assert_eq!(bus.kv_list_all("z", 2).count(), 0);
}

#[test]
fn test_list_all_stops_after_error() {
    init_test_logging();
    let host = MockHost::new().with_timeout(ExternalMessageType::KvListReq);
    let bus = Bus::new(host);

    let mut iter = bus.kv_list_all("a", 2);
    let first = iter.next().unwrap();
    assert!(first.unwrap_err().is_timeout());
    assert!(iter.next().is_none());
}

#[test]
fn test_get_timeout_is_distinct_from_not_found() {
    init_test_logging();
    let host = MockHost::new()
        .with_entry("k", "v")
        .with_timeout(ExternalMessageType::KvGetReq);
    let bus = Bus::new(host.clone());

    let err = bus.kv_get("k").unwrap_err();
    assert!(err.is_timeout());
    assert!(!matches!(err, BusError::NotFound));
    assert_no_leaks(&host);
}

#[derive(Debug, PartialEq, BorshSerialize, BorshDeserialize)]
struct Counter {
    name: String,
    hits: u64,
}

#[test]
fn test_borsh_values() {
    let (_host, bus) = setup();
    let counter = Counter {
        name: "visits".into(),
        hits: 12,
    };
    bus.kv_set_borsh("counter", &counter).unwrap();
    assert_eq!(bus.kv_get_borsh::<Counter>("counter").unwrap(), counter);
}

#[test]
fn test_borsh_value_of_wrong_shape() {
    let (_host, bus) = setup();
    bus.kv_set("counter", b"\x01").unwrap();
    let err = bus.kv_get_borsh::<Counter>("counter").unwrap_err();
    assert!(matches!(err, BusError::Unmarshal(_)));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Settings {
    enabled: bool,
    channels: Vec<String>,
}

#[test]
fn test_json_values() {
    let (host, bus) = setup();
    let settings = Settings {
        enabled: true,
        channels: vec!["general".into()],
    };
    bus.kv_set_json("settings", &settings).unwrap();
    assert_eq!(bus.kv_get_json::<Settings>("settings").unwrap(), settings);
    assert_eq!(
        host.get_kv("settings").unwrap(),
        br#"{"enabled":true,"channels":["general"]}"#
    );
}

#[test]
fn test_json_value_of_wrong_shape() {
    let (_host, bus) = setup();
    bus.kv_set("settings", b"[1,2]").unwrap();
    let err = bus.kv_get_json::<Settings>("settings").unwrap_err();
    assert!(matches!(err, BusError::Json(_)));
}
