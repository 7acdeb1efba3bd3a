//! Control-surface sync protocol
//!
//! Message contract between a control surface (CLI, panel UI) and the
//! per-page session. Requests are JSON objects discriminated by a `type`
//! field; responses are plain records whose shape depends on the request.
//!
//! Delivery guarantees are deliberately weak: at most one in-flight request
//! per caller, and an absent or crashed recipient surfaces as
//! [`ProtocolError::RecipientAbsent`], which callers must treat as "no data
//! available" rather than a fatal error.

use crate::domain::media::AudioInfo;
use crate::domain::settings::SettingsPatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors that can occur on the control channel
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The receiving context does not exist, or went away before answering
    #[error("Recipient absent")]
    RecipientAbsent,

    /// Peer answered with a payload that does not match the request
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Malformed message on the wire
    #[error("Message codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Requests a control surface can issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "settings", rename_all = "camelCase")]
pub enum Request {
    /// Merge a partial settings record into the live model and propagate
    UpdateSettings(SettingsPatch),
    /// Read-only snapshot of the enabled flag
    GetStatus,
    /// Best-effort metadata about the first qualifying media element
    GetAudioInfo,
    /// Latest frequency-magnitude frame from the shared analyser
    GetSpectrumData,
}

impl Request {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Responses, one shape per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Ack {
        success: bool,
    },
    Status {
        enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    AudioInfo {
        audio_info: AudioInfo,
    },
    /// `data` is `None` when no analyser exists yet
    Spectrum {
        data: Option<Vec<u8>>,
    },
}

impl Response {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// CONTROL CHANNEL
// ============================================================================

const CONTROL_CHANNEL_CAPACITY: usize = 32;

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Caller side of an in-process control channel
#[derive(Clone)]
pub struct ControlPort {
    tx: mpsc::Sender<Envelope>,
}

/// Session side of an in-process control channel
pub struct ControlEndpoint {
    rx: mpsc::Receiver<Envelope>,
}

/// Reply handle for one received request
pub struct Responder {
    reply: oneshot::Sender<Response>,
}

/// Create a connected control channel pair
pub fn control_channel() -> (ControlPort, ControlEndpoint) {
    let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    (ControlPort { tx }, ControlEndpoint { rx })
}

impl ControlPort {
    /// Send one request and await its response
    pub async fn send(&self, request: Request) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProtocolError::RecipientAbsent)?;
        reply_rx.await.map_err(|_| ProtocolError::RecipientAbsent)
    }

    /// Merge a partial settings record into the live model
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<bool> {
        match self.send(Request::UpdateSettings(patch)).await? {
            Response::Ack { success } => Ok(success),
            other => Err(unexpected(&other)),
        }
    }

    /// Whether the enhancer is currently enabled
    pub async fn status(&self) -> Result<bool> {
        match self.send(Request::GetStatus).await? {
            Response::Status { enabled } => Ok(enabled),
            other => Err(unexpected(&other)),
        }
    }

    /// Metadata about the first qualifying media element
    pub async fn audio_info(&self) -> Result<AudioInfo> {
        match self.send(Request::GetAudioInfo).await? {
            Response::AudioInfo { audio_info } => Ok(audio_info),
            other => Err(unexpected(&other)),
        }
    }

    /// Latest analyser frame, `None` when no chain exists yet
    pub async fn spectrum(&self) -> Result<Option<Vec<u8>>> {
        match self.send(Request::GetSpectrumData).await? {
            Response::Spectrum { data } => Ok(data),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> ProtocolError {
    ProtocolError::UnexpectedResponse(format!("{:?}", response))
}

impl ControlEndpoint {
    /// Receive the next request, or `None` when every port is gone
    pub async fn recv(&mut self) -> Option<(Request, Responder)> {
        let envelope = self.rx.recv().await?;
        Some((
            envelope.request,
            Responder {
                reply: envelope.reply,
            },
        ))
    }
}

impl Responder {
    /// Deliver the response; a caller that gave up is ignored
    pub fn respond(self, response: Response) {
        let _ = self.reply.send(response);
    }
}
