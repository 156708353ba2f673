use super::*;

/// # Safety
/// Env-mutating tests hold `ENV_LOCK` to avoid races between test threads.
unsafe fn clear_stream_env() {
    unsafe {
        std::env::remove_var("PUSHSTREAM_ACCESS_TOKEN");
        std::env::remove_var("PUSHSTREAM_USER_ID");
        std::env::remove_var("PUSHSTREAM_GROUP_IDS");
        std::env::remove_var("PUSHSTREAM_URL");
        std::env::remove_var("PUSHSTREAM_RECONNECT_DELAY_MS");
        std::env::remove_var("PUSHSTREAM_HANDSHAKE_RETRY_MS");
        std::env::remove_var("PUSHSTREAM_PING_INTERVAL_MS");
    }
}

static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[test]
fn new_uses_defaults() {
    let cfg = StreamConfig::new("tok", "u1", ["g1", "g2"]);
    assert_eq!(cfg.url, DEFAULT_PUSH_URL);
    assert_eq!(cfg.access_token, "tok");
    assert_eq!(cfg.user_id, "u1");
    assert_eq!(cfg.group_ids, vec!["g1".to_owned(), "g2".to_owned()]);
    assert_eq!(cfg.timings, StreamTimings::default());
    assert_eq!(cfg.timings.reconnect_delay, Duration::from_secs(5));
    assert_eq!(cfg.timings.handshake_retry_delay, Duration::from_secs(5));
    assert_eq!(cfg.timings.ping_interval, Duration::from_secs(30));
}

#[test]
fn group_ids_keep_order_and_drop_duplicates() {
    let cfg = StreamConfig::new("tok", "u1", ["g2", " g1 ", "", "g2", "g3"]);
    assert_eq!(cfg.group_ids, vec!["g2".to_owned(), "g1".to_owned(), "g3".to_owned()]);
}

#[test]
fn no_groups_is_empty() {
    let cfg = StreamConfig::new("tok", "u1", Vec::<String>::new());
    assert!(cfg.group_ids.is_empty());
}

#[test]
fn builders_override_url_and_timings() {
    let timings = StreamTimings {
        reconnect_delay: Duration::from_millis(10),
        handshake_retry_delay: Duration::from_millis(20),
        ping_interval: Duration::from_millis(30),
    };
    let cfg = StreamConfig::new("tok", "u1", ["g1"])
        .with_url("ws://127.0.0.1:9000/faye")
        .with_timings(timings);
    assert_eq!(cfg.url, "ws://127.0.0.1:9000/faye");
    assert_eq!(cfg.timings, timings);
}

#[test]
fn from_env_requires_access_token() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_stream_env();
        std::env::set_var("PUSHSTREAM_USER_ID", "u1");
    }

    assert_eq!(
        StreamConfig::from_env(),
        Err(ConfigError::MissingVar("PUSHSTREAM_ACCESS_TOKEN"))
    );

    unsafe { clear_stream_env() };
}

#[test]
fn from_env_rejects_blank_user_id() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_stream_env();
        std::env::set_var("PUSHSTREAM_ACCESS_TOKEN", "tok");
        std::env::set_var("PUSHSTREAM_USER_ID", "  ");
    }

    assert_eq!(StreamConfig::from_env(), Err(ConfigError::Empty("PUSHSTREAM_USER_ID")));

    unsafe { clear_stream_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_stream_env();
        std::env::set_var("PUSHSTREAM_ACCESS_TOKEN", "tok");
        std::env::set_var("PUSHSTREAM_USER_ID", "u1");
        std::env::set_var("PUSHSTREAM_GROUP_IDS", "g1, g2,,g1");
        std::env::set_var("PUSHSTREAM_URL", "ws://localhost:8080/faye");
        std::env::set_var("PUSHSTREAM_RECONNECT_DELAY_MS", "250");
        std::env::set_var("PUSHSTREAM_HANDSHAKE_RETRY_MS", "bogus");
        std::env::set_var("PUSHSTREAM_PING_INTERVAL_MS", "1000");
    }

    let cfg = StreamConfig::from_env().expect("config");
    assert_eq!(cfg.access_token, "tok");
    assert_eq!(cfg.user_id, "u1");
    assert_eq!(cfg.group_ids, vec!["g1".to_owned(), "g2".to_owned()]);
    assert_eq!(cfg.url, "ws://localhost:8080/faye");
    assert_eq!(cfg.timings.reconnect_delay, Duration::from_millis(250));
    assert_eq!(
        cfg.timings.handshake_retry_delay,
        Duration::from_millis(DEFAULT_HANDSHAKE_RETRY_MS)
    );
    assert_eq!(cfg.timings.ping_interval, Duration::from_secs(1));

    unsafe { clear_stream_env() };
}

#[test]
fn with_group_ids_replaces_and_normalizes() {
    let config = StreamConfig::new("tok", "u1", ["g1"]).with_group_ids([" g2", "g3", "g2", ""]);
    assert_eq!(config.group_ids, vec!["g2", "g3"]);
}
