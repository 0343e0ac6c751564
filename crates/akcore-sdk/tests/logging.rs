//! Host logging, subscriptions and the tracing bridge.

use akcore_sdk::log::LogArg;
use akcore_sdk::{Bus, BusError, Config, HostLogLayer, LogLevel, LogValue};
use akcore_test::{MockHost, init_test_logging};
use tracing_subscriber::layer::SubscriberExt;

fn setup() -> (MockHost, Bus<MockHost>) {
    init_test_logging();
    let host = MockHost::new();
    let bus = Bus::new(host.clone());
    (host, bus)
}

#[test]
fn test_log_publishes_paired_args() {
    let (host, bus) = setup();

    bus.log_info(
        "user joined",
        &["user".into(), "alice".into(), "count".into(), 3_i64.into()],
    )
    .unwrap();

    let logs = host.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Info);
    assert_eq!(logs[0].message, "user joined");
    assert_eq!(
        logs[0].args,
        vec![LogArg::new("user", "alice"), LogArg::new("count", 3_i64)]
    );
    assert!(host.requests().is_empty(), "logging is one-way");
}

#[test]
fn test_each_level_helper() {
    let (host, bus) = setup();
    bus.log_debug("d", &[]).unwrap();
    bus.log_info("i", &[]).unwrap();
    bus.log_warn("w", &[]).unwrap();
    bus.log_error("e", &[]).unwrap();

    let levels: Vec<_> = host.logs().iter().map(|l| l.level).collect();
    assert_eq!(
        levels,
        vec![LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error]
    );
}

#[test]
fn test_value_kinds_survive() {
    let (host, bus) = setup();
    bus.log(
        LogLevel::Warn,
        "kinds",
        &[
            "ratio".into(),
            0.5_f64.into(),
            "small".into(),
            7_u8.into(),
            "flag".into(),
            false.into(),
        ],
    )
    .unwrap();

    let args = &host.logs()[0].args;
    assert_eq!(args[0].value, LogValue::Double(0.5));
    assert_eq!(args[1].value, LogValue::Int64(7));
    assert_eq!(args[2].value, LogValue::Bool(false));
}

#[test]
fn test_malformed_args_publish_nothing() {
    let (host, bus) = setup();

    let odd = bus.log_info("odd", &["key".into()]).unwrap_err();
    assert!(matches!(odd, BusError::InvalidLogArgs(_)));

    let bad_key = bus
        .log_info("bad key", &["ok".into(), 1_i64.into(), 2_i64.into(), "v".into()])
        .unwrap_err();
    match bad_key {
        BusError::InvalidLogArgs(reason) => {
            assert_eq!(reason, "arg 2 not a key string: Int64(2)");
        },
        other => panic!("unexpected error: {other}"),
    }

    let nan = bus
        .log_info("nan", &["value".into(), f64::NAN.into()])
        .unwrap_err();
    assert!(matches!(nan, BusError::Marshal(_)));

    assert!(host.published().is_empty());
    assert_eq!(host.allocations(), 0);
}

#[test]
fn test_subscribe_and_unsubscribe() {
    let (host, bus) = setup();

    bus.subscribe("chat").unwrap();
    bus.subscribe("presence").unwrap();
    assert_eq!(host.subscriptions(), vec!["chat", "presence"]);

    bus.unsubscribe("chat").unwrap();
    assert_eq!(host.subscriptions(), vec!["presence"]);

    bus.unsubscribe("never-subscribed").unwrap();
    assert_eq!(host.subscriptions(), vec!["presence"]);

    let types: Vec<_> = host.published().iter().map(|m| m.message_type).collect();
    assert_eq!(types, vec![2, 2, 4, 4]);
    assert_eq!(host.live_regions(), 0);
}

#[test]
fn test_subscribe_transport_failure() {
    init_test_logging();
    let host = MockHost::new().with_transport_failure();
    let bus = Bus::new(host.clone());

    assert!(matches!(bus.subscribe("chat"), Err(BusError::Transport(_))));
    assert!(host.subscriptions().is_empty());
    assert_eq!(host.live_regions(), 0);
}

#[test]
fn test_layer_forwards_events() {
    let (host, bus) = setup();
    let layer = HostLogLayer::new(bus).with_min_level(LogLevel::Debug);
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!(user = "alice", attempts = 3_i64, ratio = 0.25, ok = true, "login slow");
        tracing::info!(size = u64::MAX, "huge");
        tracing::trace!("folded");
    });

    let logs = host.logs();
    assert_eq!(logs.len(), 3);

    assert_eq!(logs[0].level, LogLevel::Warn);
    assert_eq!(logs[0].message, "login slow");
    assert_eq!(
        logs[0].args,
        vec![
            LogArg::new("user", "alice"),
            LogArg::new("attempts", 3_i64),
            LogArg::new("ratio", 0.25_f64),
            LogArg::new("ok", true),
        ]
    );

    assert_eq!(logs[1].args, vec![LogArg::new("size", u64::MAX.to_string())]);
    assert_eq!(logs[2].level, LogLevel::Debug);
}

#[test]
fn test_layer_filters_below_min_level() {
    let (host, bus) = setup();
    let layer = HostLogLayer::new(bus);
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("dropped");
        tracing::info!("kept");
        tracing::error!("kept too");
    });

    let messages: Vec<_> = host.logs().into_iter().map(|l| l.message).collect();
    assert_eq!(messages, vec!["kept", "kept too"]);
}

#[test]
fn test_layer_uses_configured_level() {
    init_test_logging();
    let host = MockHost::new();
    let config = Config::from_json(r#"{"log_level":"error"}"#).unwrap();
    let bus = Bus::with_config(host.clone(), config);
    let subscriber = tracing_subscriber::registry().with(HostLogLayer::new(bus));

    tracing::subscriber::with_default(subscriber, || {
        tracing::warn!("dropped");
        tracing::error!("kept");
    });

    assert_eq!(host.logs().len(), 1);
}

#[test]
fn test_layer_survives_failing_host() {
    init_test_logging();
    let host = MockHost::new().with_transport_failure();
    let subscriber =
        tracing_subscriber::registry().with(HostLogLayer::new(Bus::new(host.clone())));

    tracing::subscriber::with_default(subscriber, || {
        tracing::error!("nowhere to go");
    });

    assert!(host.logs().is_empty());
    assert_eq!(host.live_regions(), 0);
}

#[test]
fn test_layer_skips_boundary_diagnostics() {
    init_test_logging();
    let host = MockHost::new().with_entry("k", "v");
    let bus = Bus::new(host.clone());
    let subscriber = tracing_subscriber::registry()
        .with(HostLogLayer::new(Bus::new(host.clone())).with_min_level(LogLevel::Debug));

    tracing::subscriber::with_default(subscriber, || {
        bus.kv_get("k").unwrap();
        bus.kv_get("k").unwrap();
        bus.subscribe("chat").unwrap();
    });

    assert!(host.logs().is_empty());
    assert_eq!(host.published().len(), 1, "only the subscribe");
}

#[test]
fn test_layer_still_forwards_sdk_errors() {
    init_test_logging();
    let host = MockHost::new();
    let subscriber = tracing_subscriber::registry()
        .with(HostLogLayer::new(Bus::new(host.clone())).with_min_level(LogLevel::Debug));

    tracing::subscriber::with_default(subscriber, || {
        let mut reply = akcore_sdk::BusMessage::new(1);
        reply.set_payload(&f64::NAN);
    });

    let logs = host.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(logs[0].message, "marshalling");
}
