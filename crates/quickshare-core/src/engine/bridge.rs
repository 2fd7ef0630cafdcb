//! Line-delimited JSON bridge to an external engine.
//!
//! [`BridgeEngine`] works over any reader/writer pair. A reader task routes
//! replies back to the waiting request by correlation id and forwards
//! engine pushes on an unbounded event channel, so a burst of events never
//! holds up a reply; a writer task serializes outgoing
//! frames. When the transport closes, every waiting request fails with
//! [`Error::Transport`].
//!
//! [`BridgeProcess`] launches the engine as a child process and bridges its
//! stdio.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use super::TransferEngine;
use crate::error::{Error, Result};
use crate::progress::EngineEvent;
use crate::protocol::{
    decode_body, ConnectOutcome, EngineCall, IncomingFrame, ItemSnapshot, ShareOutcome,
};
use crate::settings::SettingsDocument;

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

const OUTGOING_BUFFER: usize = 32;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// [`TransferEngine`] speaking JSON lines over a byte stream.
#[derive(Debug)]
pub struct BridgeEngine {
    outgoing: mpsc::Sender<String>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    timeout: Duration,
}

impl BridgeEngine {
    /// Start bridging over `reader`/`writer`.
    ///
    /// Returns the engine handle and the stream of engine-pushed events.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<EngineEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER);

        tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&closed),
            events_tx,
        ));
        tokio::spawn(write_loop(writer, outgoing_rx, Arc::clone(&closed)));

        let engine = Self {
            outgoing: outgoing_tx,
            pending,
            next_id: AtomicU64::new(1),
            closed,
            timeout,
        };
        (engine, events_rx)
    }

    /// Whether the transport has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn request(&self, call: EngineCall) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Transport("engine bridge is closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = call.to_frame(id)?;
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);

        tracing::trace!(id, call = call.name(), "engine request");
        if self.outgoing.send(frame).await.is_err() || self.is_closed() {
            self.forget(id);
            return Err(Error::Transport("engine bridge is closed".to_string()));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(Error::Transport(format!(
                "engine closed before answering {}",
                call.name()
            ))),
            Err(_) => {
                self.forget(id);
                tracing::warn!(id, call = call.name(), "engine request timed out");
                Err(Error::Timeout(
                    u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

async fn read_loop<R>(
    reader: R,
    pending: Pending,
    closed: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<EngineEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "engine bridge read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let frame = match IncomingFrame::parse(&line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed engine frame");
                continue;
            }
        };

        if let IncomingFrame::Reply { id, body } = frame {
            let waiter = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(body);
                }
                None => tracing::debug!(id, "reply for an unknown or expired request"),
            }
        } else if let Some(event) = frame.into_event() {
            if events.send(event).is_err() {
                tracing::trace!("event receiver dropped");
            }
        }
    }

    closed.store(true, Ordering::Release);
    let dropped = {
        let mut waiting = pending.lock().unwrap_or_else(PoisonError::into_inner);
        let n = waiting.len();
        waiting.clear();
        n
    };
    tracing::info!(pending = dropped, "engine bridge closed");
}

async fn write_loop<W>(mut writer: W, mut outgoing: mpsc::Receiver<String>, closed: Arc<AtomicBool>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = outgoing.recv().await {
        let written = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::warn!(error = %e, "engine bridge write failed");
            break;
        }
    }
    closed.store(true, Ordering::Release);
}

fn decode_list(body: Value) -> Result<Vec<ItemSnapshot>> {
    let files = match body {
        Value::Array(_) => body,
        Value::Object(mut map) if map.contains_key("success") => {
            let files = map.remove("files");
            decode_body(Value::Object(map))?.into_message()?;
            files.unwrap_or_else(|| Value::Array(Vec::new()))
        }
        other => return Err(Error::Protocol(format!("expected a file list, got {other}"))),
    };
    serde_json::from_value(files).map_err(|e| Error::Protocol(e.to_string()))
}

fn decode_settings(body: Value) -> Result<Option<SettingsDocument>> {
    match body {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) if map.get("success") == Some(&Value::Bool(false)) => {
            decode_body(Value::Object(map))?.into_message().map(|_| None)
        }
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(|e| Error::Protocol(e.to_string())),
    }
}

#[async_trait]
impl TransferEngine for BridgeEngine {
    async fn select_files(&self) -> Result<Vec<ItemSnapshot>> {
        decode_list(self.request(EngineCall::SelectFiles).await?)
    }

    async fn select_folder(&self) -> Result<Vec<ItemSnapshot>> {
        decode_list(self.request(EngineCall::SelectFolder).await?)
    }

    async fn add_files_from_drop(&self, paths: Vec<String>) -> Result<Vec<ItemSnapshot>> {
        decode_list(self.request(EngineCall::AddFilesFromDrop { paths }).await?)
    }

    async fn clear_files(&self) -> Result<Vec<ItemSnapshot>> {
        decode_list(self.request(EngineCall::ClearFiles).await?)
    }

    async fn start_cloud_share(&self) -> Result<ShareOutcome> {
        decode_body(self.request(EngineCall::StartCloudShare).await?)?.into_share()
    }

    async fn start_direct_share(&self) -> Result<ShareOutcome> {
        decode_body(self.request(EngineCall::StartDirectShare).await?)?.into_share()
    }

    async fn stop_share(&self) -> Result<()> {
        decode_body(self.request(EngineCall::StopShare).await?)?
            .into_message()
            .map(|_| ())
    }

    async fn connect_to_peer(&self, code_or_url: &str) -> Result<ConnectOutcome> {
        let call = EngineCall::ConnectToPeer {
            code_or_url: code_or_url.to_string(),
        };
        decode_body(self.request(call).await?)?.into_connect()
    }

    async fn get_settings(&self) -> Result<Option<SettingsDocument>> {
        decode_settings(self.request(EngineCall::GetSettings).await?)
    }

    async fn save_settings(&self, settings: &SettingsDocument) -> Result<String> {
        let call = EngineCall::SaveSettings {
            settings: settings.clone(),
        };
        decode_body(self.request(call).await?)?.into_message()
    }
}

/// An engine child process bridged over its stdio.
#[derive(Debug)]
pub struct BridgeProcess {
    /// Engine handle
    pub engine: BridgeEngine,
    /// Events pushed by the engine
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
    child: Child,
}

impl BridgeProcess {
    /// Launch `program` with `args` and bridge its stdin/stdout.
    ///
    /// The child is killed when the returned value is dropped.
    pub fn launch(program: &str, args: &[String], timeout: Duration) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to launch engine '{program}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("engine stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("engine stdout unavailable".to_string()))?;

        tracing::info!(program, pid = ?child.id(), "engine process started");
        let (engine, events) = BridgeEngine::spawn(stdout, stdin, timeout);
        Ok(Self {
            engine,
            events,
            child,
        })
    }

    /// Split into the engine handle, the event stream and the child.
    pub fn into_parts(self) -> (BridgeEngine, mpsc::UnboundedReceiver<EngineEvent>, Child) {
        (self.engine, self.events, self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

    struct FakeEngine {
        lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeEngine {
        async fn next_request(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn send(&mut self, frame: Value) {
            let mut line = frame.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }
    }

    fn bridge(timeout: Duration) -> (BridgeEngine, mpsc::UnboundedReceiver<EngineEvent>, FakeEngine) {
        let (core_side, engine_side) = duplex(4096);
        let (core_read, core_write) = tokio::io::split(core_side);
        let (engine_read, engine_write) = tokio::io::split(engine_side);
        let (engine, events) = BridgeEngine::spawn(core_read, core_write, timeout);
        let fake = FakeEngine {
            lines: BufReader::new(engine_read).lines(),
            writer: engine_write,
        };
        (engine, events, fake)
    }

    #[tokio::test]
    async fn test_reply_is_routed_by_id() {
        let (engine, _events, mut fake) = bridge(Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let request = fake.next_request().await;
            assert_eq!(request["call"], "start_direct_share");
            let id = request["id"].clone();
            fake.send(json!({"kind": "reply", "id": id, "body": {"success": true, "type": "p2p", "code": "482910"}}))
                .await;
            fake
        });

        let outcome = engine.start_direct_share().await.unwrap();
        assert_eq!(
            outcome,
            ShareOutcome::Direct {
                code: "482910".to_string()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_events_are_forwarded() {
        let (_engine, mut events, mut fake) = bridge(Duration::from_secs(5));
        fake.send(json!({"kind": "progress", "index": 0, "status": "Gönderiliyor", "percent": 42}))
            .await;
        fake.send(json!({"kind": "stats", "speed": "1.00 MB/s", "sent": "4.00 MB"}))
            .await;

        assert!(matches!(
            events.recv().await,
            Some(EngineEvent::Progress(ref p)) if p.percent == 42
        ));
        assert!(matches!(events.recv().await, Some(EngineEvent::Stats(_))));
    }

    #[tokio::test]
    async fn test_file_list_and_failure_bodies() {
        let (engine, _events, mut fake) = bridge(Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let request = fake.next_request().await;
            assert_eq!(request["args"]["paths"][0], "/tmp/a.txt");
            fake.send(json!({"kind": "reply", "id": request["id"], "body": [
                {"name": "a.txt", "size": "1.00 KB", "is_folder": false}
            ]}))
            .await;

            let request = fake.next_request().await;
            fake.send(json!({"kind": "reply", "id": request["id"], "body": {"success": false, "error": "no files selected"}}))
                .await;
            fake
        });

        let list = engine
            .add_files_from_drop(vec!["/tmp/a.txt".to_string()])
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].size_display, "1.00 KB");

        let err = engine.start_cloud_share().await.unwrap_err();
        assert!(matches!(err, Error::Engine(ref m) if m == "no files selected"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout() {
        let (engine, _events, _fake) = bridge(Duration::from_millis(50));
        assert!(matches!(
            engine.get_settings().await,
            Err(Error::Timeout(50))
        ));
    }

    #[tokio::test]
    async fn test_event_burst_does_not_block_reply() {
        let (engine, mut events, mut fake) = bridge(Duration::from_secs(2));

        let server = tokio::spawn(async move {
            let request = fake.next_request().await;
            for i in 0..300 {
                fake.send(json!({"kind": "stats", "speed": format!("{i} KB/s"), "sent": "1.00 MB"}))
                    .await;
            }
            fake.send(json!({"kind": "reply", "id": request["id"], "body": {"success": true, "type": "p2p", "code": "482910"}}))
                .await;
            fake
        });

        let outcome = engine.start_direct_share().await.unwrap();
        assert!(matches!(outcome, ShareOutcome::Direct { ref code } if code == "482910"));
        server.await.unwrap();

        let mut received = 0;
        while events.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 300);
    }

    #[tokio::test]
    async fn test_closed_transport_fails_pending() {
        let (engine, _events, mut fake) = bridge(Duration::from_secs(5));

        let server = tokio::spawn(async move {
            let _request = fake.next_request().await;
            drop(fake);
        });

        assert!(matches!(engine.stop_share().await, Err(Error::Transport(_))));
        server.await.unwrap();
        assert!(engine.is_closed());
        assert!(matches!(engine.clear_files().await, Err(Error::Transport(_))));
    }

    #[test]
    fn test_decode_settings() {
        assert!(decode_settings(Value::Null).unwrap().is_none());
        assert!(decode_settings(json!({})).unwrap().is_none());
        let doc = decode_settings(json!({"signaling_url": "wss://s", "use_duckdns": true}))
            .unwrap()
            .unwrap();
        assert!(doc.use_duck_dns);
        assert!(decode_settings(json!({"success": false, "error": "locked"})).is_err());
    }
}
