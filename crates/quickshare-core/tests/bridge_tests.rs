//! Orchestrator driven through the JSON-lines bridge.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use quickshare_core::engine::BridgeEngine;
use quickshare_core::manifest::ItemStatus;
use quickshare_core::session::SessionState;
use quickshare_core::{Error, Orchestrator};

/// A scripted engine on the far side of a duplex pipe.
///
/// Answers each request by call name and pushes two progress frames right
/// after the share starts.
async fn scripted_engine(stream: tokio::io::DuplexStream) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let request: Value = serde_json::from_str(&line).expect("request is json");
        let id = request["id"].clone();
        let call = request["call"].as_str().unwrap_or_default().to_string();

        let body = match call.as_str() {
            "select_files" => json!([
                {"name": "a.txt", "size": "10.00 MB", "is_folder": false},
                {"name": "b.txt", "size": "3.00 KB", "is_folder": false}
            ]),
            "clear_files" => json!([]),
            "start_direct_share" => json!({"success": true, "type": "p2p", "code": "482910"}),
            "start_cloud_share" => json!({"success": false, "error": "Tünel başlatılamadı"}),
            "stop_share" => Value::Null,
            "get_settings" => json!({}),
            "save_settings" => json!({"success": true, "message": "Ayarlar kaydedildi"}),
            _ => json!({"success": false, "error": format!("unsupported call {call}")}),
        };

        let mut frames = vec![json!({"kind": "reply", "id": id, "body": body})];
        if call == "start_direct_share" {
            frames.push(json!({"kind": "progress", "index": 0, "status": "Gönderiliyor", "percent": 50}));
            frames.push(json!({"kind": "progress", "index": 7, "status": "Gönderiliyor", "percent": 50}));
            frames.push(json!({"kind": "stats", "speed": "5.00 MB/s", "sent": "5.00 MB"}));
        }
        for frame in frames {
            let mut out = frame.to_string();
            out.push('\n');
            if write.write_all(out.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

fn bridged() -> (Orchestrator, tokio::sync::mpsc::UnboundedReceiver<quickshare_core::progress::EngineEvent>) {
    let (core_side, engine_side) = tokio::io::duplex(8192);
    tokio::spawn(scripted_engine(engine_side));
    let (read, write) = tokio::io::split(core_side);
    let (engine, events) = BridgeEngine::spawn(read, write, Duration::from_secs(5));
    (Orchestrator::new(engine), events)
}

#[tokio::test]
async fn test_share_over_bridge() {
    let (mut app, mut events) = bridged();
    assert!(app.is_attached());

    app.select_files().await.unwrap();
    assert_eq!(app.manifest().len(), 2);

    app.start_direct_share().await.unwrap();
    assert_eq!(app.session().state, SessionState::Active);
    assert_eq!(app.session().room_code_or_url(), Some("482910"));

    for _ in 0..3 {
        let event = events.recv().await.unwrap();
        app.handle_event(event);
    }
    let item = app.manifest().get(0).unwrap();
    assert_eq!(item.status, ItemStatus::InProgress);
    assert_eq!(item.progress_percent, 50);
    assert_eq!(app.manifest().get(1).unwrap().progress_percent, 0);
    assert_eq!(app.snapshot().stats.unwrap().total_sent, "5.00 MB");

    app.stop().await.unwrap();
    assert_eq!(app.session().state, SessionState::Idle);
}

#[tokio::test]
async fn test_remote_failure_over_bridge() {
    let (mut app, _events) = bridged();
    app.select_files().await.unwrap();

    let err = app.start_cloud_share().await.unwrap_err();
    assert!(matches!(err, Error::Engine(ref m) if m == "Tünel başlatılamadı"));
    assert_eq!(app.session().state, SessionState::Idle);
}

#[tokio::test]
async fn test_settings_over_bridge() {
    let (mut app, _events) = bridged();
    let doc = app.load_settings().await.unwrap();
    assert_eq!(doc, quickshare_core::settings::SettingsDocument::default());

    let message = app.save_settings(&doc).await.unwrap();
    assert_eq!(message, "Ayarlar kaydedildi");
}

#[tokio::test]
async fn test_unsupported_call_is_engine_error() {
    let (mut app, _events) = bridged();
    assert!(matches!(app.select_folder().await, Err(Error::Engine(_))));
}
