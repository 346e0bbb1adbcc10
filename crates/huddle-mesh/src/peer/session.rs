//! Offer/answer state machine for one mesh connection.

use std::sync::Arc;

use huddle_common::{
    ConnectionId, IceCandidate, MediaTrack, NegotiationError, PeerId, SessionDescription,
};
use tracing::{debug, info, warn};

use super::types::PeerState;
use crate::level::LevelPoller;
use crate::transport::{ConnectionState, MediaConnection, SenderId, SignalingState};

/// Negotiates and maintains the connection to one remote participant.
///
/// Whether this side sends the first offer is fixed at construction; the
/// orchestrator decides it from roster order. Track changes reuse the same
/// connection and, once it has connected at least once, produce a
/// renegotiation offer for the caller to send. A change made before the
/// first `Connected`, or while another offer awaits its answer, is queued
/// and offered once signaling is stable again.
///
/// After connect either side may renegotiate. The initiator is the impolite
/// side of a glare: it ignores the colliding offer. The other side rolls its
/// own offer back, answers, and re-offers its change afterwards.
pub struct PeerSession {
    peer_id: PeerId,
    conn_id: ConnectionId,
    connection: Arc<dyn MediaConnection>,
    initiator: bool,
    state: PeerState,
    transport_state: ConnectionState,
    ever_connected: bool,
    renegotiation_pending: bool,
    audio_sender: Option<SenderId>,
    video_sender: Option<SenderId>,
    level: Option<LevelPoller>,
}

impl PeerSession {
    pub fn new(
        peer_id: impl Into<PeerId>,
        conn_id: ConnectionId,
        connection: Arc<dyn MediaConnection>,
        initiator: bool,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            conn_id,
            connection,
            initiator,
            state: PeerState::New,
            transport_state: ConnectionState::New,
            ever_connected: false,
            renegotiation_pending: false,
            audio_sender: None,
            video_sender: None,
            level: None,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn is_initiator(&self) -> bool {
        self.initiator
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn transport_state(&self) -> ConnectionState {
        self.transport_state
    }

    pub fn has_video(&self) -> bool {
        self.video_sender.is_some()
    }

    pub fn renegotiation_pending(&self) -> bool {
        self.renegotiation_pending
    }

    /// Add the tracks a fresh connection starts with. No renegotiation.
    pub fn attach_local_tracks(
        &mut self,
        audio: Option<&MediaTrack>,
        video: Option<&MediaTrack>,
    ) -> Result<(), NegotiationError> {
        self.ensure_open()?;
        if let Some(track) = audio {
            self.audio_sender = Some(self.connection.add_track(track)?);
        }
        if let Some(track) = video {
            self.video_sender = Some(self.connection.add_track(track)?);
        }
        Ok(())
    }

    // -- Negotiation --------------------------------------------------------

    pub async fn create_offer(&mut self) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;
        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(offer.clone()).await?;
        if self.state == PeerState::New {
            self.state = PeerState::Negotiating;
        }
        debug!(peer = %self.peer_id, conn = %self.conn_id, "Created offer");
        Ok(offer)
    }

    /// Apply a remote offer and produce the answer to send back.
    ///
    /// On glare the initiator rejects the offer with `Glare`; the other side
    /// rolls back and answers. Call [`Self::resume_renegotiation`] after
    /// sending the answer to re-offer anything that was rolled back.
    pub async fn handle_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        self.ensure_open()?;
        if self.connection.signaling_state() == SignalingState::HaveLocalOffer {
            if self.initiator {
                warn!(peer = %self.peer_id, conn = %self.conn_id, "Rejecting glaring offer");
                return Err(NegotiationError::Glare(self.peer_id.clone()));
            }
            debug!(peer = %self.peer_id, conn = %self.conn_id, "Glare, rolling back local offer");
            self.connection
                .set_local_description(SessionDescription::rollback())
                .await?;
            self.renegotiation_pending = true;
        }
        self.connection.set_remote_description(offer).await?;
        let answer = self.connection.create_answer().await?;
        self.connection.set_local_description(answer.clone()).await?;
        if self.state == PeerState::New {
            self.state = PeerState::Negotiating;
        }
        debug!(peer = %self.peer_id, conn = %self.conn_id, "Answered offer");
        Ok(answer)
    }

    /// Apply the answer to our offer. Returns the next offer if a
    /// renegotiation was queued behind this one.
    pub async fn handle_answer(
        &mut self,
        answer: SessionDescription,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        self.ensure_open()?;
        self.connection.set_remote_description(answer).await?;
        self.resume_renegotiation().await
    }

    /// Offer a queued renegotiation if the connection has connected and no
    /// offer is outstanding.
    pub async fn resume_renegotiation(
        &mut self,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        if !self.renegotiation_pending
            || !self.ever_connected
            || self.state == PeerState::Closed
            || self.connection.signaling_state() != SignalingState::Stable
        {
            return Ok(None);
        }
        self.renegotiation_pending = false;
        self.create_offer().await.map(Some)
    }

    /// Failures are logged; a bad candidate never ends the session.
    pub async fn add_ice_candidate(&self, candidate: IceCandidate) {
        if self.state == PeerState::Closed {
            return;
        }
        if let Err(e) = self.connection.add_ice_candidate(candidate).await {
            warn!(peer = %self.peer_id, error = %e, "Failed to add ICE candidate");
        }
    }

    // -- Track changes ------------------------------------------------------

    /// Swap the outbound audio. Adds a sender (and renegotiates) only if the
    /// connection started without audio.
    pub async fn replace_audio_track(
        &mut self,
        track: &MediaTrack,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        self.ensure_open()?;
        match self.audio_sender {
            Some(sender) => {
                self.connection
                    .replace_track(sender, Some(track.clone()))
                    .await?;
                Ok(None)
            }
            None => {
                self.audio_sender = Some(self.connection.add_track(track)?);
                self.renegotiate().await
            }
        }
    }

    /// Start sending `track` as video. Returns the renegotiation offer, if
    /// one is due now.
    pub async fn add_video_track(
        &mut self,
        track: &MediaTrack,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        self.ensure_open()?;
        if let Some(sender) = self.video_sender {
            self.connection
                .replace_track(sender, Some(track.clone()))
                .await?;
            return Ok(None);
        }
        self.video_sender = Some(self.connection.add_track(track)?);
        self.renegotiate().await
    }

    pub async fn remove_video_track(
        &mut self,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        self.ensure_open()?;
        let Some(sender) = self.video_sender.take() else {
            return Ok(None);
        };
        self.connection.remove_track(sender)?;
        self.renegotiate().await
    }

    async fn renegotiate(&mut self) -> Result<Option<SessionDescription>, NegotiationError> {
        if !self.ever_connected {
            debug!(peer = %self.peer_id, "Deferring renegotiation until connected");
            self.renegotiation_pending = true;
            return Ok(None);
        }
        if self.connection.signaling_state() != SignalingState::Stable {
            debug!(peer = %self.peer_id, "Offer outstanding, queueing renegotiation");
            self.renegotiation_pending = true;
            return Ok(None);
        }
        self.create_offer().await.map(Some)
    }

    // -- Transport ----------------------------------------------------------

    /// Record a transport state change. Returns an offer when a deferred
    /// renegotiation fires on the first connect.
    pub async fn on_connection_state(
        &mut self,
        state: ConnectionState,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        self.transport_state = state;
        match state {
            ConnectionState::Connected => {
                if self.state == PeerState::Closed {
                    return Ok(None);
                }
                self.state = PeerState::Connected;
                let first = !self.ever_connected;
                self.ever_connected = true;
                info!(peer = %self.peer_id, conn = %self.conn_id, "Peer connected");
                if first {
                    return self.resume_renegotiation().await;
                }
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {
                warn!(peer = %self.peer_id, conn = %self.conn_id, ?state, "Peer connection lost");
            }
            ConnectionState::Closed => {
                self.level = None;
                self.state = PeerState::Closed;
            }
            ConnectionState::New | ConnectionState::Connecting => {}
        }
        Ok(None)
    }

    /// Replace the level poller for this peer's audio.
    pub fn set_level_poller(&mut self, poller: LevelPoller) {
        self.level = Some(poller);
    }

    pub fn has_level_poller(&self) -> bool {
        self.level.is_some()
    }

    pub fn close(&mut self) {
        if self.state == PeerState::Closed {
            return;
        }
        self.level = None;
        self.connection.close();
        self.state = PeerState::Closed;
        debug!(peer = %self.peer_id, conn = %self.conn_id, "Peer session closed");
    }

    fn ensure_open(&self) -> Result<(), NegotiationError> {
        if self.state == PeerState::Closed {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.close();
    }
}
