//! Full sessions over real transports against loopback daemons

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use helpers::{daemon_script, quick_config, reply, Action, FakeDaemon, LoopbackRadio};
use soundroid_connector::{
    AddressFamily, ConnectionState, Connector, ConnectorConfig, ConnectorError, HostAddress,
    TransportConfig, TransportError, TransportKind,
};

// ============================================================================
// WiFi
// ============================================================================

#[test]
fn test_wifi_session() {
    let daemon = FakeDaemon::desktop();
    let host = HostAddress::wifi("office", "127.0.0.1", daemon.port_string()).unwrap();
    let mut connector = Connector::wifi(ConnectorConfig::responsive());

    assert_eq!(connector.kind(), TransportKind::Wifi);
    connector.connect_to(&host).unwrap();
    assert!(connector.hand_shake().unwrap());
    assert_eq!(connector.connected_host_name(), "office");

    assert_eq!(connector.get_cur_vol(), "42");
    assert_eq!(connector.current_volume(), Some(42));
    assert!(connector.send_chg_vol(-5));
    assert!(connector.send_mute_state(true));
    assert!(!connector.is_muted());

    connector.close_connection();
    assert_eq!(
        daemon.received(),
        vec!["hello", "get_vol", "get_vol", "chg_vol -5", "mute", "is_muted"]
    );
}

#[test]
fn test_wifi_host_from_saved_line() {
    let daemon = FakeDaemon::desktop();
    let line = format!("studio,127.0.0.1,{}", daemon.port());
    let host = HostAddress::from_line(AddressFamily::Ipv4, &line).unwrap();

    let mut connector = Connector::wifi(ConnectorConfig::responsive());
    connector.connect_to(&host).unwrap();
    assert!(connector.hand_shake().unwrap());
    assert_eq!(connector.connected_host_name(), "studio");
}

#[test]
fn test_wifi_silent_daemon() {
    let daemon = FakeDaemon::spawn(|_| Action::Ignore);
    let mut connector = Connector::wifi(quick_config());

    connector.connect("127.0.0.1", &daemon.port_string()).unwrap();

    let started = Instant::now();
    assert!(!connector.hand_shake().unwrap());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(connector.state(), ConnectionState::TransportOpen);
}

#[test]
fn test_wifi_late_reply_does_not_leak() {
    let daemon = FakeDaemon::spawn(|line| match line {
        "hello" => reply("hello"),
        "get_vol" => {
            std::thread::sleep(Duration::from_millis(400));
            reply("42")
        }
        "is_muted" => reply("true"),
        _ => reply("ERR"),
    });
    let mut connector = Connector::wifi(quick_config());
    connector.connect("127.0.0.1", &daemon.port_string()).unwrap();
    assert!(connector.hand_shake().unwrap());

    // gives up after 150 ms; the answer lands later
    assert_eq!(connector.get_cur_vol(), "");
    std::thread::sleep(Duration::from_millis(500));

    assert!(connector.is_muted());
}

#[test]
fn test_wifi_volume_timeout_shorter_than_io_timeout() {
    let daemon = FakeDaemon::spawn(|line| match line {
        "hello" => reply("hello"),
        _ => Action::Ignore,
    });
    let config = ConnectorConfig::new()
        .with_volume_timeout(Duration::from_millis(200))
        .with_transport(TransportConfig::new().with_io_timeout(Duration::from_secs(3)));
    let mut connector = Connector::wifi(config);
    connector.connect("127.0.0.1", &daemon.port_string()).unwrap();
    assert!(connector.hand_shake().unwrap());

    let started = Instant::now();
    assert_eq!(connector.get_cur_vol(), "");
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(200));
    assert!(waited < Duration::from_secs(2), "waited {:?}", waited);
}

#[test]
fn test_wifi_connect_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut connector = Connector::wifi(quick_config());

    let err = connector.connect("127.0.0.1", &port.to_string()).unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Transport(TransportError::Connection { .. })
    ));
    assert_eq!(connector.state(), ConnectionState::Disconnected);
    assert!(!connector.is_connected_to_daemon());
}

#[test]
fn test_wifi_reachability_has_no_traffic() {
    let connector = Connector::wifi(ConnectorConfig::responsive());
    assert!(connector.is_addr_reachable("127.0.0.1").unwrap());
}

// ============================================================================
// Bluetooth
// ============================================================================

#[test]
fn test_bluetooth_session() {
    let radio = Arc::new(LoopbackRadio::with_desk(daemon_script));
    let mut connector =
        Connector::bluetooth(Arc::clone(&radio) as _, ConnectorConfig::responsive());
    let host = HostAddress::bluetooth("desk", "00:1A:7D:DA:71:13").unwrap();

    assert_eq!(connector.kind(), TransportKind::Bluetooth);
    connector.connect_to(&host).unwrap();
    assert!(connector.hand_shake().unwrap());
    assert_eq!(connector.connected_host_name(), "desk");

    assert_eq!(connector.get_cur_vol(), "42");
    assert!(connector.send_chg_vol(3));
    assert!(connector.send_mute_state(false));
    assert!(!connector.is_muted());

    assert_eq!(radio.channels(), vec![11]);
    connector.close_connection();
    assert_eq!(connector.state(), ConnectionState::Disconnected);
}

#[test]
fn test_bluetooth_silent_daemon_times_out() {
    let radio = Arc::new(LoopbackRadio::with_desk(|_| Action::Ignore));
    let mut connector = Connector::bluetooth(radio, quick_config());
    connector.connect("desk", "").unwrap();

    let started = Instant::now();
    assert!(!connector.hand_shake().unwrap());
    assert!(started.elapsed() >= Duration::from_millis(300));

    assert_eq!(connector.get_cur_vol(), "");
    assert!(!connector.is_muted());
}

#[test]
fn test_bluetooth_sequential_replies() {
    let radio = Arc::new(LoopbackRadio::with_desk(|line| match line {
        "hello" => reply("hello"),
        "get_vol" => reply("42"),
        "is_muted" => reply("true"),
        _ => Action::Ignore,
    }));
    let mut connector = Connector::bluetooth(radio, ConnectorConfig::responsive());
    connector.connect("desk", "").unwrap();
    assert!(connector.hand_shake().unwrap());

    assert_eq!(connector.get_cur_vol(), "42");
    assert!(connector.is_muted());
}

#[test]
fn test_bluetooth_hang_up_ends_wait() {
    let radio = Arc::new(LoopbackRadio::with_desk(|_| Action::HangUp));
    let mut connector = Connector::bluetooth(radio, ConnectorConfig::default());
    connector.connect("desk", "").unwrap();

    let started = Instant::now();
    assert!(!connector.hand_shake().unwrap());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_bluetooth_unknown_device() {
    let radio = Arc::new(LoopbackRadio::with_desk(daemon_script));
    let mut connector = Connector::bluetooth(radio, quick_config());

    let err = connector.connect("kitchen", "").unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Transport(TransportError::NotFound(_))
    ));
    assert_eq!(connector.state(), ConnectionState::Disconnected);
}

#[test]
fn test_bluetooth_reachability_is_unsupported() {
    let radio = Arc::new(LoopbackRadio::with_desk(daemon_script));
    let connector = Connector::bluetooth(radio, quick_config());

    assert!(matches!(
        connector.is_addr_reachable("00:1A:7D:DA:71:13"),
        Err(ConnectorError::Transport(TransportError::Unsupported { .. }))
    ));
}

#[test]
fn test_bluetooth_close_twice() {
    let radio = Arc::new(LoopbackRadio::with_desk(daemon_script));
    let mut connector = Connector::bluetooth(radio, quick_config());
    connector.connect("desk", "").unwrap();

    connector.close_connection();
    connector.close_connection();
    assert!(!connector.is_connected_to_daemon());
}
