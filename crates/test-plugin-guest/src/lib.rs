//! Test WASM guest plugin for end-to-end testing.
//!
//! Runs its checks from `start` against the real host calls and publishes
//! one message per check on the `HOST` topic. The message body is the check
//! name; a failed check carries the reason in the envelope's error detail.
//!
//! | Check            | Host requests used                  |
//! |------------------|-------------------------------------|
//! | `KVSetGetDelete` | `KV_GET`, `KV_SET`, `KV_DELETE`     |
//! | `KVList`         | `KV_SET`, `KV_LIST`                 |
//!
//! Built as a `cdylib` targeting `wasm32-unknown-unknown` for Extism.

use akcore_sdk::prelude::*;
use akcore_sdk::ExtismHost;

/// Topic the host listens on for check results.
const RESULT_TOPIC: &str = "HOST";

type Check = fn(&Bus<ExtismHost>) -> Result<(), String>;

const CHECKS: &[(&str, Check)] = &[
    ("KVSetGetDelete", kv_set_get_delete),
    ("KVList", kv_list),
];

#[akcore_sdk::plugin]
fn init() -> BusResult<TopicRouter> {
    let bus = Bus::host();
    for (name, check) in CHECKS {
        report(bus, name, check(bus))?;
    }
    Ok(TopicRouter::new())
}

fn report(bus: &Bus<ExtismHost>, name: &str, outcome: Result<(), String>) -> BusResult<()> {
    let mut msg = BusMessage::new(0)
        .with_topic(RESULT_TOPIC)
        .with_message(name.as_bytes().to_vec());
    if let Err(detail) = outcome {
        msg = msg.with_error(Error::new(CommonErrorCode::Unknown).with_detail(detail));
    }
    bus.send(&msg)
}

fn kv_set_get_delete(bus: &Bus<ExtismHost>) -> Result<(), String> {
    let key = b"test-key";
    let value = b"test-value";

    if bus.kv_get(key).is_ok() {
        return Err("expected error on non-existent key".into());
    }
    bus.kv_set(key, value)
        .map_err(|e| format!("error setting key: {e}"))?;
    let got = bus
        .kv_get(key)
        .map_err(|e| format!("error getting key: {e}"))?;
    if got != value {
        return Err(format!(
            "got {:?}, want {:?}",
            String::from_utf8_lossy(&got),
            String::from_utf8_lossy(value)
        ));
    }
    bus.kv_delete(key)
        .map_err(|e| format!("error deleting key: {e}"))?;
    match bus.kv_get(key) {
        Ok(_) => Err("expected error on deleted key".into()),
        Err(BusError::NotFound) => Ok(()),
        Err(e) => Err(format!("expected not found, got {e}")),
    }
}

fn kv_list(bus: &Bus<ExtismHost>) -> Result<(), String> {
    let value = b"test-value";
    for i in 0..4 {
        for prefix in ["a", "b"] {
            let key = format!("{prefix}{i}");
            bus.kv_set(&key, value)
                .map_err(|e| format!("setting key {key}: {e}"))?;
        }
    }

    let page = bus
        .kv_list("b", 2, 1)
        .map_err(|e| format!("listing values: {e}"))?;
    if page.total_matches != 4 {
        return Err(format!("wanted 4 matches, got {}", page.total_matches));
    }
    if page.keys.len() != 2 {
        return Err(format!("wanted 2 keys, got {}", page.keys.len()));
    }
    for (got, want) in page.keys.iter().zip(["b1", "b2"]) {
        if got.as_slice() != want.as_bytes() {
            return Err(format!(
                "key want {want:?}, got {:?}",
                String::from_utf8_lossy(got)
            ));
        }
    }
    Ok(())
}
