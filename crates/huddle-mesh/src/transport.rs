//! Media transport surface the mesh is driven against.
//!
//! The mesh never touches codecs, ICE, or sockets. A host backend implements
//! `MediaBackend` and `MediaConnection`; this crate only decides when to
//! offer, answer, and swap tracks.

use std::sync::Arc;

use async_trait::async_trait;
use huddle_common::{ConnectionId, IceCandidate, MediaTrack, NegotiationError, SessionDescription};
use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States that are surfaced to the UI and never retried.
    pub fn is_failure(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

/// Handle to one outbound sender on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub u64);

/// Callbacks from a connection, delivered in order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    IceCandidate(IceCandidate),
    Track(MediaTrack),
    ConnectionStateChanged(ConnectionState),
    NegotiationNeeded,
}

pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub direction: Direction,
    pub ice_servers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription)
        -> Result<(), NegotiationError>;

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Candidates that arrive before the remote description are queued by
    /// the transport.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    fn add_track(&self, track: &MediaTrack) -> Result<SenderId, NegotiationError>;

    fn remove_track(&self, sender: SenderId) -> Result<(), NegotiationError>;

    /// Swap what a sender carries without renegotiating.
    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<MediaTrack>,
    ) -> Result<(), NegotiationError>;

    fn signaling_state(&self) -> SignalingState;

    /// Idempotent.
    fn close(&self);
}

/// Reads the current level of a remote audio track, in [0, 1].
pub trait LevelMeter: Send {
    fn level(&mut self) -> f32;
}

pub trait MediaBackend: Send + Sync {
    fn create_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<(Arc<dyn MediaConnection>, TransportEvents), NegotiationError>;

    /// `None` when the track cannot be metered.
    fn level_meter(&self, track: &MediaTrack) -> Option<Box<dyn LevelMeter>>;
}

/// A running screen capture handed to the mesh by the host.
pub trait ScreenCapture: Send + Sync {
    fn tracks(&self) -> Vec<MediaTrack>;

    fn stop(&mut self);

    /// Resolves when the capture ends outside our control (the user closes
    /// the picker, the window goes away). Can only be taken once.
    fn take_ended(&mut self) -> Option<oneshot::Receiver<()>>;
}

// ---------------------------------------------------------------------------
// Connection plumbing
// ---------------------------------------------------------------------------

/// Events from every connection, tagged with the connection they came from.
pub type TaggedEvent = (ConnectionId, TransportEvent);

/// Create a connection and spawn the pump that tags its events into `sink`.
///
/// The pump exits when the backend drops its event sender or `sink` closes.
pub fn open_connection(
    backend: &dyn MediaBackend,
    direction: Direction,
    ice_servers: &[String],
    sink: mpsc::UnboundedSender<TaggedEvent>,
) -> Result<(ConnectionId, Arc<dyn MediaConnection>), NegotiationError> {
    let config = ConnectionConfig {
        direction,
        ice_servers: ice_servers.to_vec(),
    };
    let (connection, mut events) = backend.create_connection(&config)?;
    let id = ConnectionId::next();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if sink.send((id, event)).is_err() {
                break;
            }
        }
    });

    Ok((id, connection))
}
