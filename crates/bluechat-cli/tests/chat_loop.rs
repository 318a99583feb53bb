//! Tests for the chat loop, driven through an in-memory input pipe against
//! a simulated host.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::time::Duration;

use bluechat_cli::{list_peers, run_chat, ChatOptions};
use bluechat_core::{PeerIdentity, Role, SessionEvent, SessionState};
use bluechat_radio::sim::SimAir;
use bluechat_radio::StaticPermissions;
use bluechat_session::{spawn_session, SessionConfig, SessionHandle};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    wanted: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(EVENT_TIMEOUT, async {
        loop {
            if let Ok(event) = events.recv().await {
                if wanted(&event) {
                    return event;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn session_on(air: &SimAir, identity: PeerIdentity) -> SessionHandle {
    spawn_session(
        Arc::new(air.radio(identity)),
        Arc::new(StaticPermissions::granted()),
        SessionConfig::default(),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_join_with_peer_chats_and_quits() {
    let air = SimAir::new();
    let host_identity = PeerIdentity::new("00:01", "host");
    let host = session_on(&air, host_identity.clone());
    let mut host_events = host.subscribe();
    host.select_role(Role::Host).await.unwrap();

    let join = session_on(&air, PeerIdentity::new("00:02", "join"));
    let (mut input, input_reader) = tokio::io::duplex(1024);
    let options = ChatOptions {
        role: Role::Join,
        peer: Some(host_identity),
        json: false,
    };

    let chat = tokio::spawn(async move {
        let mut out = Vec::new();
        let result = run_chat(
            &join,
            options,
            BufReader::new(input_reader),
            &mut out,
            CancellationToken::new(),
        )
        .await;
        (result, String::from_utf8(out).unwrap())
    });

    wait_for(&mut host_events, |e| e.state() == Some(&SessionState::Connected)).await;
    host.send("hi").await.unwrap();

    input.write_all(b"hello\n").await.unwrap();
    let received = wait_for(&mut host_events, |e| {
        matches!(e, SessionEvent::MessageReceived { .. })
    })
    .await;
    assert_eq!(received.message().unwrap().text(), "hello");

    input.write_all(b"/quit\n").await.unwrap();
    let (result, out) = timeout(EVENT_TIMEOUT, chat).await.unwrap().unwrap();

    result.unwrap();
    assert!(out.contains("connected"));
    assert!(out.contains("Them: hi"));
    assert!(out.contains("Me: hello"));

    wait_for(&mut host_events, |e| e.state() == Some(&SessionState::Closed)).await;
}

#[tokio::test]
async fn test_json_mode_prints_event_lines() {
    let air = SimAir::new();
    let host = session_on(&air, PeerIdentity::new("00:01", "host"));
    let (mut input, input_reader) = tokio::io::duplex(64);

    let chat = tokio::spawn(async move {
        let mut out = Vec::new();
        let options = ChatOptions {
            role: Role::Host,
            peer: None,
            json: true,
        };
        let result = run_chat(
            &host,
            options,
            BufReader::new(input_reader),
            &mut out,
            CancellationToken::new(),
        )
        .await;
        (result, String::from_utf8(out).unwrap())
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    input.write_all(b"/quit\n").await.unwrap();
    let (result, out) = timeout(EVENT_TIMEOUT, chat).await.unwrap().unwrap();

    result.unwrap();
    let first = out.lines().next().expect("at least one event line");
    let event: SessionEvent = serde_json::from_str(first).unwrap();
    assert_eq!(event.state(), Some(&SessionState::Advertising));
}

#[tokio::test]
async fn test_send_before_connect_reports_inline() {
    let air = SimAir::new();
    let host = session_on(&air, PeerIdentity::new("00:01", "host"));
    let cancel = CancellationToken::new();
    let stop = cancel.clone();

    let chat = tokio::spawn(async move {
        let mut out = Vec::new();
        let options = ChatOptions {
            role: Role::Host,
            peer: None,
            json: false,
        };
        let input: &[u8] = b"too early\n/connect 9\n";
        let result = run_chat(&host, options, BufReader::new(input), &mut out, cancel).await;
        (result, String::from_utf8(out).unwrap())
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop.cancel();
    let (result, out) = timeout(EVENT_TIMEOUT, chat).await.unwrap().unwrap();

    result.unwrap();
    assert!(out.contains("! not connected"));
    assert!(out.contains("! no peer #9"));
}

#[tokio::test]
async fn test_disabled_radio_fails_start() {
    let air = SimAir::new();
    let radio = Arc::new(air.radio(PeerIdentity::unnamed("00:01")));
    radio.set_enabled(false);
    let session = spawn_session(
        radio,
        Arc::new(StaticPermissions::granted()),
        SessionConfig::default(),
    );

    let mut out = Vec::new();
    let options = ChatOptions {
        role: Role::Host,
        peer: None,
        json: false,
    };
    let input: &[u8] = b"";
    let err = run_chat(
        &session,
        options,
        BufReader::new(input),
        &mut out,
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("could not start as host"));
}

#[tokio::test]
async fn test_list_peers_merges_paired_and_discovered() {
    let air = SimAir::new();
    let radio = air.radio(PeerIdentity::unnamed("00:00"));
    radio.add_paired(PeerIdentity::new("11:11", "laptop"));
    radio.script_discovery(PeerIdentity::new("11:11", "laptop"));
    radio.script_discovery(PeerIdentity::unnamed("22:22"));

    let mut out = Vec::new();
    let count = list_peers(&radio, Duration::from_millis(50), &mut out)
        .await
        .unwrap();

    assert_eq!(count, 2);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "[1] laptop (11:11)\n[2] 22:22\n");
    assert!(!radio.is_discovering());
}
