//! Engine wire types.
//!
//! The transfer engine answers with loosely-shaped JSON objects
//! (`{success, type, code?, url?, files?, message?, error?}`). This module
//! holds those shapes and converts them at the boundary into typed outcomes,
//! so nothing past this point handles an untyped response.
//!
//! ## Bridge framing
//!
//! One JSON document per line.
//!
//! | Direction | Frame |
//! |-----------|-------|
//! | core → engine | `{"id":7,"call":"start_direct_share","args":{}}` |
//! | engine → core | `{"kind":"reply","id":7,"body":{...}}` |
//! | engine → core | `{"kind":"progress","index":0,"status":"..","percent":50}` |
//! | engine → core | `{"kind":"stats","speed":"..","sent":".."}` |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::progress::{EngineEvent, ProgressEvent, StatsEvent};
use crate::settings::SettingsDocument;

/// One entry of a file-list snapshot returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Base name of the file or folder
    pub name: String,
    /// Pre-formatted size, e.g. `"15.00 MB"`
    #[serde(rename = "size", default)]
    pub size_display: String,
    /// Whether the entry is a folder
    #[serde(default)]
    pub is_folder: bool,
    /// Engine-side status label, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Engine-side local path, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ItemSnapshot {
    /// Create a file entry with a display size.
    #[must_use]
    pub fn file(name: impl Into<String>, size_display: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_display: size_display.into(),
            is_folder: false,
            status: None,
            path: None,
        }
    }

    /// Create a folder entry with a display size.
    #[must_use]
    pub fn folder(name: impl Into<String>, size_display: impl Into<String>) -> Self {
        Self {
            is_folder: true,
            ..Self::file(name, size_display)
        }
    }
}

/// A file offered by a remote cloud share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFile {
    /// File name
    pub name: String,
    /// Pre-formatted size
    #[serde(rename = "size", default)]
    pub size_display: String,
    /// Size in bytes, when the engine reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_size: Option<u64>,
}

/// Result of a successful share start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// Direct P2P room; the code is shown to the sender
    Direct {
        /// Room code
        code: String,
    },
    /// Cloud upload reachable through a public link
    Cloud {
        /// Public web link
        url: String,
    },
}

/// Result of a successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Joined a P2P room
    Direct {
        /// Room code as resolved by the engine
        code: String,
        /// Optional status line from the engine
        message: Option<String>,
    },
    /// Resolved a cloud link to a file listing
    Cloud {
        /// Files available from the remote source
        files: Vec<PeerFile>,
        /// Optional status line from the engine
        message: Option<String>,
    },
}

/// The untyped `{success, ...}` response body used by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Whether the request succeeded
    #[serde(default)]
    pub success: bool,
    /// `"p2p"` or `"cloud"`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// P2P room code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Cloud link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Cloud listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<PeerFile>>,
    /// Informational message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const KIND_P2P: &str = "p2p";
const KIND_CLOUD: &str = "cloud";

impl ResponseBody {
    /// A bare `{success: true}` acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A `{success: false, error}` failure.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A successful reply that only carries a message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// A successful P2P reply carrying a room code.
    #[must_use]
    pub fn p2p(code: impl Into<String>) -> Self {
        Self {
            kind: Some(KIND_P2P.to_string()),
            code: Some(code.into()),
            ..Self::ok()
        }
    }

    /// A successful cloud share reply carrying a public link.
    #[must_use]
    pub fn cloud_link(url: impl Into<String>) -> Self {
        Self {
            kind: Some(KIND_CLOUD.to_string()),
            url: Some(url.into()),
            ..Self::ok()
        }
    }

    /// A successful cloud connect reply carrying a listing.
    #[must_use]
    pub fn cloud_listing(url: impl Into<String>, files: Vec<PeerFile>) -> Self {
        Self {
            files: Some(files),
            ..Self::cloud_link(url)
        }
    }

    fn into_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::Engine(
                self.error
                    .unwrap_or_else(|| "unknown engine error".to_string()),
            ))
        }
    }

    /// Interpret the body as a share-start response.
    ///
    /// Anything that is not `p2p` is treated as a cloud link.
    pub fn into_share(self) -> Result<ShareOutcome> {
        let body = self.into_success()?;
        if body.kind.as_deref() == Some(KIND_P2P) {
            let code = body
                .code
                .ok_or_else(|| Error::Protocol("p2p share reply without a code".to_string()))?;
            Ok(ShareOutcome::Direct { code })
        } else {
            let url = body
                .url
                .ok_or_else(|| Error::Protocol("cloud share reply without a url".to_string()))?;
            Ok(ShareOutcome::Cloud { url })
        }
    }

    /// Interpret the body as a connect response.
    pub fn into_connect(self) -> Result<ConnectOutcome> {
        let body = self.into_success()?;
        match body.kind.as_deref() {
            Some(KIND_CLOUD) => {
                let files = body.files.ok_or_else(|| {
                    Error::Protocol("cloud connect reply without a file listing".to_string())
                })?;
                Ok(ConnectOutcome::Cloud {
                    files,
                    message: body.message,
                })
            }
            Some(KIND_P2P) => {
                let code = body.code.ok_or_else(|| {
                    Error::Protocol("p2p connect reply without a room code".to_string())
                })?;
                Ok(ConnectOutcome::Direct {
                    code,
                    message: body.message,
                })
            }
            other => Err(Error::Protocol(format!(
                "unknown connect reply type: {}",
                other.unwrap_or("<missing>")
            ))),
        }
    }

    /// Interpret the body as a plain acknowledgement, keeping its message.
    pub fn into_message(self) -> Result<String> {
        self.into_success().map(|body| body.message.unwrap_or_default())
    }
}

/// A request sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// Open the native file picker
    SelectFiles,
    /// Open the native folder picker
    SelectFolder,
    /// Add dropped local paths
    AddFilesFromDrop {
        /// Raw local paths
        paths: Vec<String>,
    },
    /// Clear the engine-side selection
    ClearFiles,
    /// Start a cloud share
    StartCloudShare,
    /// Start a direct P2P share
    StartDirectShare,
    /// Stop the active share
    StopShare,
    /// Join a room or resolve a cloud link
    ConnectToPeer {
        /// Trimmed room code or URL
        code_or_url: String,
    },
    /// Fetch the settings document
    GetSettings,
    /// Persist the settings document
    SaveSettings {
        /// The document to store
        settings: SettingsDocument,
    },
}

impl EngineCall {
    /// The call name used on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectFiles => "select_files",
            Self::SelectFolder => "select_folder",
            Self::AddFilesFromDrop { .. } => "add_files_from_drop",
            Self::ClearFiles => "clear_files",
            Self::StartCloudShare => "start_cloud_share",
            Self::StartDirectShare => "start_direct_share",
            Self::StopShare => "stop_share",
            Self::ConnectToPeer { .. } => "connect_to_peer",
            Self::GetSettings => "get_settings",
            Self::SaveSettings { .. } => "save_settings",
        }
    }

    /// Encode a request frame with the given correlation id.
    pub fn to_frame(&self, id: u64) -> Result<String> {
        let args = match self {
            Self::AddFilesFromDrop { paths } => json!({ "paths": paths }),
            Self::ConnectToPeer { code_or_url } => json!({ "code_or_url": code_or_url }),
            Self::SaveSettings { settings } => json!({ "settings": settings }),
            _ => json!({}),
        };
        let frame = json!({ "id": id, "call": self.name(), "args": args });
        Ok(serde_json::to_string(&frame)?)
    }
}

/// A frame received from the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IncomingFrame {
    /// Reply to a request
    Reply {
        /// Correlation id of the request
        id: u64,
        /// Raw reply body
        #[serde(default)]
        body: Value,
    },
    /// Per-item progress push
    Progress {
        /// Manifest index
        index: i64,
        /// Free-text status label
        #[serde(default)]
        status: String,
        /// Progress percentage
        percent: i64,
        /// Manifest generation the event refers to
        #[serde(default)]
        generation: Option<u64>,
    },
    /// Session-wide throughput push
    Stats {
        /// Formatted speed
        speed: String,
        /// Formatted total sent
        sent: String,
    },
}

impl IncomingFrame {
    /// Parse one line of bridge input.
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::Protocol(format!("{e}: {line}")))
    }

    /// Convert an engine push into an [`EngineEvent`]; replies yield `None`.
    #[must_use]
    pub fn into_event(self) -> Option<EngineEvent> {
        match self {
            Self::Reply { .. } => None,
            Self::Progress {
                index,
                status,
                percent,
                generation,
            } => Some(EngineEvent::Progress(ProgressEvent {
                index,
                status_label: status,
                percent,
                generation,
            })),
            Self::Stats { speed, sent } => Some(EngineEvent::Stats(StatsEvent {
                speed,
                total_sent: sent,
            })),
        }
    }
}

/// Decode a reply body that may be `null` into a [`ResponseBody`].
///
/// `null` is treated as a bare acknowledgement.
pub fn decode_body(body: Value) -> Result<ResponseBody> {
    if body.is_null() {
        return Ok(ResponseBody::ok());
    }
    serde_json::from_value(body).map_err(|e| Error::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_reply_p2p() {
        let body: ResponseBody =
            serde_json::from_str(r#"{"success":true,"type":"p2p","code":"482910"}"#).unwrap();
        assert_eq!(
            body.into_share().unwrap(),
            ShareOutcome::Direct {
                code: "482910".to_string()
            }
        );
    }

    #[test]
    fn test_share_reply_cloud() {
        let body = ResponseBody::cloud_link("https://a.trycloudflare.com");
        assert_eq!(
            body.into_share().unwrap(),
            ShareOutcome::Cloud {
                url: "https://a.trycloudflare.com".to_string()
            }
        );
    }

    #[test]
    fn test_failure_reply_keeps_message() {
        let body: ResponseBody =
            serde_json::from_str(r#"{"success":false,"error":"Lütfen önce dosya seçin."}"#)
                .unwrap();
        let err = body.into_share().unwrap_err();
        assert!(matches!(err, Error::Engine(ref m) if m == "Lütfen önce dosya seçin."));
    }

    #[test]
    fn test_failure_without_error_text() {
        let err = ResponseBody::default().into_message().unwrap_err();
        assert_eq!(err.to_string(), "unknown engine error");
    }

    #[test]
    fn test_p2p_without_code_is_protocol_error() {
        let body: ResponseBody = serde_json::from_str(r#"{"success":true,"type":"p2p"}"#).unwrap();
        assert!(matches!(body.into_share(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_connect_reply_cloud_listing() {
        let raw = r#"{"success":true,"type":"cloud","url":"https://x","files":[
            {"name":"a.txt","size":"1.00 KB","raw_size":1024},
            {"name":"b.bin","size":"2.00 MB"}]}"#;
        let body: ResponseBody = serde_json::from_str(raw).unwrap();
        match body.into_connect().unwrap() {
            ConnectOutcome::Cloud { files, .. } => {
                assert_eq!(files.len(), 2);
                assert_eq!(files[0].raw_size, Some(1024));
                assert_eq!(files[1].size_display, "2.00 MB");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_connect_reply_unknown_type() {
        let body: ResponseBody = serde_json::from_str(r#"{"success":true,"type":"lan"}"#).unwrap();
        assert!(matches!(body.into_connect(), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_request_frame_shape() {
        let frame = EngineCall::ConnectToPeer {
            code_or_url: "123456".to_string(),
        }
        .to_frame(9)
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["call"], "connect_to_peer");
        assert_eq!(value["args"]["code_or_url"], "123456");

        let unit = EngineCall::StopShare.to_frame(1).unwrap();
        assert_eq!(unit, r#"{"args":{},"call":"stop_share","id":1}"#);
    }

    #[test]
    fn test_incoming_frames() {
        let progress =
            IncomingFrame::parse(r#"{"kind":"progress","index":1,"status":"Gönderiliyor","percent":40}"#)
                .unwrap();
        assert!(matches!(
            progress.into_event(),
            Some(EngineEvent::Progress(ProgressEvent { index: 1, percent: 40, .. }))
        ));

        let reply = IncomingFrame::parse(r#"{"kind":"reply","id":3,"body":null}"#).unwrap();
        assert!(matches!(reply, IncomingFrame::Reply { id: 3, .. }));

        assert!(IncomingFrame::parse("not json").is_err());
    }

    #[test]
    fn test_null_body_is_ack() {
        assert!(decode_body(Value::Null).unwrap().success);
    }
}
