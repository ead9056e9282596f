//! Host server driven over in-memory framed pipes.

use std::sync::Arc;
use std::time::Duration;

use panel_bridge::framing::{read_frame, write_frame, FramedTransport};
use panel_bridge::{
    BridgeConfig, BridgeError, CorrelationId, Envelope, PanelPeer, UNKNOWN_MESSAGE_ERROR,
};
use panel_host::config::{HostConfig, SimulationConfig};
use panel_host::server;
use serde_json::{json, Value};
use tokio::io::{duplex, AsyncWriteExt, BufReader, DuplexStream};
use tokio::task::JoinHandle;

struct Harness {
    to_host: DuplexStream,
    from_host: BufReader<DuplexStream>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn start(config: HostConfig) -> Self {
        let (to_host, host_in) = duplex(64 * 1024);
        let (host_out, from_host) = duplex(64 * 1024);
        let server = tokio::spawn(async move { server::run(host_in, host_out, &config).await });
        Self {
            to_host,
            from_host: BufReader::new(from_host),
            server,
        }
    }

    async fn send(&mut self, envelope: &Envelope) {
        write_frame(&mut self.to_host, &envelope.to_json().unwrap())
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Option<Envelope> {
        let payload = read_frame(&mut self.from_host).await.unwrap()?;
        Some(Envelope::from_json(&payload).unwrap())
    }
}

fn instant_config() -> HostConfig {
    HostConfig {
        simulation: SimulationConfig {
            dummy_data_delay: Duration::ZERO,
            analysis_delay: Duration::ZERO,
        },
        ..HostConfig::default()
    }
}

#[tokio::test]
async fn announces_ready_then_answers_ping() {
    let mut host = Harness::start(instant_config());

    let ready = host.recv().await.unwrap();
    assert_eq!(ready.kind, "webviewReady");
    assert_eq!(ready.payload, Some(json!(true)));
    assert!(ready.is_notification());

    host.send(&Envelope::notification("webviewUiReady", None)).await;
    host.send(&Envelope::request("ping", None, CorrelationId::new("p1")))
        .await;

    let pong = host.recv().await.unwrap();
    assert_eq!(pong.kind, "pong");
    assert_eq!(pong.correlation_id, Some(CorrelationId::new("p1")));
    assert_eq!(pong.payload, Some(json!("pong")));
}

#[tokio::test]
async fn test_message_echoes_original_payload() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    host.send(&Envelope::request(
        "testFromWebview",
        Some(json!({ "hello": "host" })),
        CorrelationId::new("t1"),
    ))
    .await;

    let reply = host.recv().await.unwrap();
    assert_eq!(reply.kind, "testResponseFromExtension");
    assert_eq!(
        reply.payload,
        Some(json!({
            "message": "Response from Extension to testFromWebview!",
            "originalPayload": { "hello": "host" },
        }))
    );
}

#[tokio::test]
async fn analysis_rejects_non_string_code() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    host.send(&Envelope::request(
        "runAnalysis",
        Some(json!({ "codeToAnalyze": 42 })),
        CorrelationId::new("a1"),
    ))
    .await;

    let reply = host.recv().await.unwrap();
    assert_eq!(reply.kind, "analysisError");
    assert_eq!(reply.correlation_id, Some(CorrelationId::new("a1")));
    assert_eq!(
        reply.error,
        Some(json!({
            "message": "Invalid payload for runAnalysis: codeToAnalyze must be a string."
        }))
    );
}

#[tokio::test]
async fn analysis_error_keyword_returns_server_error_details() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    host.send(&Envelope::request(
        "runAnalysis",
        Some(json!({ "codeToAnalyze": "raise Error" })),
        CorrelationId::new("a2"),
    ))
    .await;

    let reply = host.recv().await.unwrap();
    assert_eq!(reply.kind, "analysisError");
    let error = reply.error.unwrap();
    assert_eq!(error["details"]["statusCode"], 500);
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    write_frame(&mut host.to_host, r#"{"payload":1}"#).await.unwrap();
    write_frame(&mut host.to_host, "not json").await.unwrap();
    host.send(&Envelope::request("ping", None, CorrelationId::new("p2")))
        .await;

    let pong = host.recv().await.unwrap();
    assert_eq!(pong.correlation_id, Some(CorrelationId::new("p2")));
}

#[tokio::test]
async fn unknown_request_type_is_rejected() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    host.send(&Envelope::request("frobnicate", None, CorrelationId::new("u1")))
        .await;

    let reply = host.recv().await.unwrap();
    assert_eq!(reply.kind, UNKNOWN_MESSAGE_ERROR);
    assert_eq!(reply.correlation_id, Some(CorrelationId::new("u1")));
}

#[tokio::test(start_paused = true)]
async fn closing_input_waits_for_in_flight_handlers() {
    let config = HostConfig {
        simulation: SimulationConfig {
            dummy_data_delay: Duration::from_millis(1500),
            analysis_delay: Duration::ZERO,
        },
        ..HostConfig::default()
    };
    let mut host = Harness::start(config);
    host.recv().await.unwrap();

    host.send(&Envelope::request("getDummyData", None, CorrelationId::new("d1")))
        .await;
    let Harness {
        to_host,
        mut from_host,
        server,
    } = host;
    drop(to_host);

    let payload = read_frame(&mut from_host).await.unwrap().unwrap();
    let reply = Envelope::from_json(&payload).unwrap();
    assert_eq!(reply.kind, "dummyDataResponse");
    assert_eq!(reply.correlation_id, Some(CorrelationId::new("d1")));
    let data = reply.payload.unwrap();
    assert!(data["message"]
        .as_str()
        .unwrap()
        .starts_with("This is DUMMY data from the extension, fetched at "));
    assert!(data["timestamp"].is_string());
    assert!(data["randomNumber"].is_number());

    assert!(read_frame(&mut from_host).await.unwrap().is_none());
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn protocol_log_records_both_directions() {
    let path =
        std::env::temp_dir().join(format!("panel-host-protocol-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let mut config = instant_config();
    config.bridge.protocol_log = Some(path.clone());

    let mut host = Harness::start(config);
    host.recv().await.unwrap();
    host.send(&Envelope::request("ping", None, CorrelationId::new("l1")))
        .await;
    host.recv().await.unwrap();
    let Harness { to_host, server, .. } = host;
    drop(to_host);
    server.await.unwrap().unwrap();

    let transcript = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = transcript.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("-> ") && lines[0].contains("webviewReady"));
    assert!(lines[1].starts_with("<- ") && lines[1].contains("\"l1\""));
    assert!(lines[2].starts_with("-> ") && lines[2].contains("pong"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn panel_peer_talks_to_host_over_frames() {
    let (panel_out, host_in) = duplex(64 * 1024);
    let (host_out, panel_in) = duplex(64 * 1024);
    let server =
        tokio::spawn(async move { server::run(host_in, host_out, &instant_config()).await });

    let (framed, writer) = FramedTransport::spawn(panel_out, None);
    let peer = PanelPeer::new(Arc::new(framed), &BridgeConfig::default());
    let (ready_tx, mut ready_rx) = tokio::sync::mpsc::unbounded_channel();
    let _subscription = peer.dispatcher().subscribe(move |envelope| {
        let _ = ready_tx.send(envelope.kind.clone());
    });

    let dispatcher = peer.dispatcher().clone();
    let pump = tokio::spawn(async move {
        let mut reader = BufReader::new(panel_in);
        while let Some(payload) = read_frame(&mut reader).await.unwrap() {
            dispatcher.dispatch(Envelope::from_json(&payload).unwrap());
        }
    });

    assert_eq!(ready_rx.recv().await.unwrap(), "webviewReady");

    let report = peer
        .client()
        .request("runAnalysis", Some(json!({ "codeToAnalyze": "nothing here" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report["issues"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["metrics"]["linesOfCode"], 1);

    let empty = peer
        .client()
        .request("runAnalysis", Some(json!({ "codeToAnalyze": "empty" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(empty["issues"], Value::Array(Vec::new()));

    let err = peer
        .client()
        .request("runAnalysis", Some(json!({ "codeToAnalyze": "error" })))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Remote(_)));
    assert!(peer.client().table().is_empty());

    drop(peer);
    writer.await.unwrap().unwrap();
    pump.await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn oversized_frame_ends_the_session_without_panicking() {
    let mut host = Harness::start(instant_config());
    host.recv().await.unwrap();

    host.to_host
        .write_all(b"Content-Length: 18446744073709551615\r\n\r\n{}")
        .await
        .unwrap();

    let outcome = host.server.await.expect("server task must not panic");
    let err = outcome.unwrap_err();
    assert!(err.to_string().contains("exceeds limit"), "{err:#}");
}
