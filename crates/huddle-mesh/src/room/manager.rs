//! Room session: the one task that owns every connection for a room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use huddle_audio::{AudioEngine, GateSession, NoiseGate, RnnoiseFactory};
use huddle_common::{
    AudioError, ClientMessage, ConnectionId, HuddleError, IceCandidate, MediaTrack,
    NegotiationError, PeerId, RelayMessage, RosterEntry, SessionDescription, SignalingError,
    TrackKind,
};
use huddle_config::HuddleConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::pending::PendingSignals;
use super::types::{PeerRecord, RoomCommand, RoomEvent, RoomSettings, RoomSnapshot};
use crate::level::{LevelPoller, LevelUpdate, SpeakingDetector};
use crate::peer::{PeerSession, PeerState};
use crate::screen_share::{ScreenSharer, ScreenViewer};
use crate::signaling::SignalingClient;
use crate::transport::{
    open_connection, Direction, MediaBackend, ScreenCapture, TaggedEvent, TransportEvent,
};

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 64;

/// A change applied to the outbound media of every peer session.
enum TrackChange {
    Audio(MediaTrack),
    AddVideo(MediaTrack),
    RemoveVideo,
}

// ---------------------------------------------------------------------------
// Room Session
// ---------------------------------------------------------------------------

/// Owns the relay link, one [`PeerSession`] per remote participant, both
/// sides of the screen-share overlay, and the local media.
///
/// Everything is driven from [`RoomSession::run`]; other tasks talk to it
/// through a [`RoomHandle`] and listen on the `RoomEvent` receiver.
pub struct RoomSession {
    settings: RoomSettings,
    backend: Arc<dyn MediaBackend>,
    signaling: SignalingClient,
    inbound: mpsc::UnboundedReceiver<RelayMessage>,
    commands: mpsc::Receiver<RoomCommand>,
    events: mpsc::Sender<RoomEvent>,
    transport_tx: mpsc::UnboundedSender<TaggedEvent>,
    transport_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    level_tx: mpsc::UnboundedSender<LevelUpdate>,
    level_rx: mpsc::UnboundedReceiver<LevelUpdate>,

    self_id: Option<PeerId>,
    self_name: String,
    records: HashMap<PeerId, PeerRecord>,
    sessions: HashMap<PeerId, PeerSession>,
    pending: PendingSignals,

    mic: MediaTrack,
    muted: bool,
    camera: Option<MediaTrack>,
    gate: NoiseGate,
    gate_session: Option<GateSession>,

    sharer: Option<ScreenSharer>,
    capture_ended: Option<oneshot::Receiver<()>>,
    viewer: ScreenViewer,
}

impl RoomSession {
    pub fn new(
        settings: RoomSettings,
        backend: Arc<dyn MediaBackend>,
        engine: Arc<dyn AudioEngine>,
        mic: MediaTrack,
        signaling: SignalingClient,
        inbound: mpsc::UnboundedReceiver<RelayMessage>,
    ) -> (Self, RoomHandle, mpsc::Receiver<RoomEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (level_tx, level_rx) = mpsc::unbounded_channel();

        let gate = NoiseGate::new(engine, Arc::new(RnnoiseFactory), settings.gate);
        let viewer = ScreenViewer::new(
            backend.clone(),
            settings.ice_servers.clone(),
            transport_tx.clone(),
        );

        let session = Self {
            pending: PendingSignals::new(settings.signal_grace),
            settings,
            backend,
            signaling,
            inbound,
            commands: command_rx,
            events: event_tx,
            transport_tx,
            transport_rx,
            level_tx,
            level_rx,
            self_id: None,
            self_name: String::new(),
            records: HashMap::new(),
            sessions: HashMap::new(),
            mic,
            muted: false,
            camera: None,
            gate,
            gate_session: None,
            sharer: None,
            capture_ended: None,
            viewer,
        };
        (session, RoomHandle { tx: command_tx }, event_rx)
    }

    /// Drive the session until the relay goes away or `leave` is requested.
    pub async fn run(mut self) {
        let sweep_every = self.settings.signal_grace.max(Duration::from_secs(1));
        let mut sweep = tokio::time::interval(sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = self.inbound.recv() => match msg {
                    Some(msg) => self.handle_relay(msg).await,
                    None => {
                        warn!("Relay connection lost");
                        self.emit(RoomEvent::Disconnected).await;
                        break;
                    }
                },
                Some((conn_id, event)) = self.transport_rx.recv() => {
                    self.handle_transport(conn_id, event).await;
                }
                Some(update) = self.level_rx.recv() => self.handle_level(update).await,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
                _ = capture_ended(&mut self.capture_ended) => self.on_capture_ended().await,
                _ = sweep.tick() => {
                    let dropped = self.pending.expire(Instant::now());
                    if dropped > 0 {
                        debug!(dropped, "Expired signals from unknown senders");
                    }
                }
            }
        }

        self.teardown();
    }

    // -- Relay messages -----------------------------------------------------

    pub(crate) async fn handle_relay(&mut self, msg: RelayMessage) {
        match msg {
            RelayMessage::Welcome {
                peer_id,
                name,
                peers,
            } => self.on_welcome(peer_id, name, peers).await,
            RelayMessage::Join { peer_id, name } => self.on_join(peer_id, name).await,
            RelayMessage::Leave { peer_id, name } => self.on_leave(&peer_id, name).await,
            RelayMessage::Rename { peer_id, name } => self.on_rename(peer_id, name).await,
            msg @ (RelayMessage::Offer { .. }
            | RelayMessage::Answer { .. }
            | RelayMessage::IceCandidate { .. }) => self.on_mesh_signal(msg).await,
            RelayMessage::MuteStatus { peer_id, muted } => {
                let Some(record) = self.records.get_mut(&peer_id) else {
                    debug!(peer = %peer_id, "Mute status for unknown peer");
                    return;
                };
                record.muted = muted;
                self.emit(RoomEvent::MuteChanged { peer_id, muted }).await;
            }
            RelayMessage::CameraStatus { peer_id, enabled } => {
                let Some(record) = self.records.get_mut(&peer_id) else {
                    debug!(peer = %peer_id, "Camera status for unknown peer");
                    return;
                };
                record.camera_enabled = enabled;
                if !enabled {
                    record.camera_stream = None;
                }
                self.emit(RoomEvent::CameraChanged { peer_id, enabled }).await;
            }
            RelayMessage::ScreenStart { peer_id } => {
                let Some(record) = self.records.get_mut(&peer_id) else {
                    debug!(peer = %peer_id, "Screen start for unknown peer");
                    return;
                };
                record.screen_sharing = true;
                record.screen_subscribed = false;
                record.screen_stream = None;
                // A new share starts with no viewer edge to it.
                self.viewer.close(&peer_id);
                info!(peer = %peer_id, "Peer started screen share");
                self.emit(RoomEvent::ScreenShareStarted { peer_id }).await;
            }
            RelayMessage::ScreenStop { peer_id } => {
                self.viewer.close(&peer_id);
                let Some(record) = self.records.get_mut(&peer_id) else {
                    return;
                };
                record.clear_screen();
                info!(peer = %peer_id, "Peer stopped screen share");
                self.emit(RoomEvent::ScreenShareStopped { peer_id }).await;
            }
            RelayMessage::ScreenSubscribe { from, .. } => self.on_screen_subscribe(from).await,
            RelayMessage::ScreenUnsubscribe { from, .. } => {
                if let Some(sharer) = self.sharer.as_mut() {
                    sharer.remove_subscriber(&from);
                }
            }
            RelayMessage::ScreenOffer { from, sdp, .. } => {
                match self.viewer.handle_offer(&from, sdp).await {
                    Ok(answer) => {
                        self.send(ClientMessage::ScreenAnswer {
                            to: from.clone(),
                            sdp: answer,
                        });
                        if let Some(record) = self.records.get_mut(&from) {
                            record.screen_subscribed = true;
                        }
                    }
                    Err(e) => debug!(sharer = %from, error = %e, "Ignoring screen offer"),
                }
            }
            RelayMessage::ScreenAnswer { from, sdp, .. } => {
                let Some(sharer) = self.sharer.as_ref() else {
                    debug!(peer = %from, "Screen answer while not sharing");
                    return;
                };
                if let Err(e) = sharer.handle_answer(&from, sdp).await {
                    warn!(peer = %from, error = %e, "Failed to apply screen answer");
                }
            }
            RelayMessage::ScreenIce {
                from, candidate, ..
            } => self.on_screen_ice(from, candidate).await,
        }
    }

    async fn on_welcome(&mut self, peer_id: PeerId, name: String, peers: Vec<RosterEntry>) {
        info!(peer = %peer_id, name = %name, peers = peers.len(), "Joined room");
        self.self_id = Some(peer_id.clone());
        self.self_name = name.clone();
        self.emit(RoomEvent::Joined {
            peer_id,
            name: name.clone(),
        })
        .await;

        let preferred = self.settings.preferred_name.clone();
        if !preferred.is_empty() && preferred != name {
            self.send(ClientMessage::RenameRequest { name: preferred });
        }
        self.announce_local_state();

        // Everyone already here was present first, so we offer to all of them.
        for entry in peers {
            let mut record = PeerRecord::new(entry.id.clone(), entry.name.clone());
            record.screen_sharing = entry.screen_sharing;
            self.records.insert(entry.id.clone(), record);
            self.emit(RoomEvent::PeerJoined {
                peer_id: entry.id.clone(),
                name: entry.name,
            })
            .await;
            self.open_session(&entry.id, true).await;
        }
    }

    async fn on_join(&mut self, peer_id: PeerId, name: String) {
        if self.self_id.as_ref() == Some(&peer_id) {
            return;
        }
        info!(peer = %peer_id, name = %name, "Peer joined");
        self.records
            .insert(peer_id.clone(), PeerRecord::new(peer_id.clone(), name.clone()));
        self.emit(RoomEvent::PeerJoined {
            peer_id: peer_id.clone(),
            name,
        })
        .await;
        self.open_session(&peer_id, false).await;

        // The newcomer missed earlier status broadcasts.
        self.announce_local_state();

        for msg in self.pending.take(&peer_id, Instant::now()) {
            debug!(peer = %peer_id, "Replaying held signal");
            self.dispatch_signal(msg).await;
        }
    }

    async fn on_leave(&mut self, peer_id: &str, name: Option<String>) {
        if let Some(mut session) = self.sessions.remove(peer_id) {
            session.close();
        }
        self.viewer.close(peer_id);
        if let Some(sharer) = self.sharer.as_mut() {
            sharer.remove_subscriber(peer_id);
        }
        self.pending.discard(peer_id);

        let Some(record) = self.records.remove(peer_id) else {
            debug!(peer = %peer_id, "Leave for unknown peer");
            return;
        };
        let name = name.unwrap_or(record.display_name);
        info!(peer = %peer_id, name = %name, "Peer left");
        self.emit(RoomEvent::PeerLeft {
            peer_id: peer_id.to_string(),
            name,
        })
        .await;
    }

    async fn on_rename(&mut self, peer_id: PeerId, name: String) {
        if self.self_id.as_ref() == Some(&peer_id) {
            info!(name = %name, "Renamed");
            self.self_name = name.clone();
            self.emit(RoomEvent::SelfRenamed { name }).await;
            return;
        }
        let Some(record) = self.records.get_mut(&peer_id) else {
            debug!(peer = %peer_id, "Rename for unknown peer");
            return;
        };
        record.display_name = name.clone();
        self.emit(RoomEvent::PeerRenamed { peer_id, name }).await;
    }

    async fn on_mesh_signal(&mut self, msg: RelayMessage) {
        let Some(from) = signal_sender(&msg).cloned() else {
            return;
        };
        if !self.records.contains_key(&from) {
            debug!(peer = %from, "Holding signal from unknown sender");
            self.pending.push(&from, msg, Instant::now());
            return;
        }
        self.dispatch_signal(msg).await;
    }

    /// Route a mesh signal from a known sender to its session.
    async fn dispatch_signal(&mut self, msg: RelayMessage) {
        match msg {
            RelayMessage::Offer { from, sdp, .. } => {
                if !self.sessions.contains_key(&from) {
                    self.open_session(&from, false).await;
                }
                let Some(session) = self.sessions.get_mut(&from) else {
                    return;
                };
                let answer = match session.handle_offer(sdp).await {
                    Ok(answer) => answer,
                    // Our offer stands; the other side rolls back.
                    Err(NegotiationError::Glare(_)) => return,
                    Err(e) => return self.negotiation_failed(&from, e).await,
                };
                let next = session.resume_renegotiation().await;
                self.send(ClientMessage::Answer {
                    to: from.clone(),
                    sdp: answer,
                });
                self.send_queued_offer(&from, next).await;
            }
            RelayMessage::Answer { from, sdp, .. } => {
                let Some(session) = self.sessions.get_mut(&from) else {
                    debug!(peer = %from, "Answer with no session");
                    return;
                };
                let next = session.handle_answer(sdp).await;
                self.send_queued_offer(&from, next).await;
            }
            RelayMessage::IceCandidate {
                from, candidate, ..
            } => match self.sessions.get(&from) {
                Some(session) => session.add_ice_candidate(candidate).await,
                None => debug!(peer = %from, "ICE candidate with no session"),
            },
            _ => {}
        }
    }

    async fn send_queued_offer(
        &mut self,
        peer_id: &str,
        offer: Result<Option<SessionDescription>, NegotiationError>,
    ) {
        match offer {
            Ok(Some(sdp)) => self.send(ClientMessage::Offer {
                to: peer_id.to_string(),
                sdp,
            }),
            Ok(None) => {}
            Err(e) => self.negotiation_failed(peer_id, e).await,
        }
    }

    async fn on_screen_subscribe(&mut self, from: PeerId) {
        let Some(sharer) = self.sharer.as_mut() else {
            debug!(peer = %from, "Screen subscribe while not sharing");
            return;
        };
        match sharer.add_subscriber(&from).await {
            Ok(offer) => self.send(ClientMessage::ScreenOffer {
                to: from,
                sdp: offer,
            }),
            Err(e) => warn!(peer = %from, error = %e, "Failed to add screen subscriber"),
        }
    }

    /// `screen-ice` does not say which edge it is for; a peer can be both
    /// our viewer and our sharer, so it goes to whichever edges exist.
    async fn on_screen_ice(&mut self, from: PeerId, candidate: IceCandidate) {
        let to_viewer = self.viewer.add_ice_candidate(&from, candidate.clone()).await;
        let to_sharer = match self.sharer.as_ref() {
            Some(sharer) => sharer.add_ice_candidate(&from, candidate).await,
            None => false,
        };
        if !to_viewer && !to_sharer {
            debug!(peer = %from, "Screen ICE with no edge");
        }
    }

    // -- Transport events ---------------------------------------------------

    pub(crate) async fn handle_transport(&mut self, conn_id: ConnectionId, event: TransportEvent) {
        if let Some(peer_id) = self.session_for(conn_id) {
            self.on_peer_transport(peer_id, event).await;
        } else if let Some(sharer_id) = self.viewer.edge_for(conn_id).cloned() {
            self.on_viewer_transport(sharer_id, event).await;
        } else if let Some(subscriber) = self
            .sharer
            .as_ref()
            .and_then(|sharer| sharer.edge_for(conn_id).cloned())
        {
            if let TransportEvent::IceCandidate(candidate) = event {
                self.send(ClientMessage::ScreenIce {
                    to: subscriber,
                    candidate,
                });
            }
        } else {
            debug!(conn = %conn_id, "Dropping event from retired connection");
        }
    }

    fn session_for(&self, conn_id: ConnectionId) -> Option<PeerId> {
        self.sessions
            .iter()
            .find(|(_, session)| session.conn_id() == conn_id)
            .map(|(id, _)| id.clone())
    }

    async fn on_peer_transport(&mut self, peer_id: PeerId, event: TransportEvent) {
        match event {
            TransportEvent::IceCandidate(candidate) => {
                self.send(ClientMessage::IceCandidate {
                    to: peer_id,
                    candidate,
                });
            }
            TransportEvent::Track(track) => match track.kind() {
                TrackKind::Audio => self.start_level_poll(&peer_id, &track),
                TrackKind::Video => {
                    if let Some(record) = self.records.get_mut(&peer_id) {
                        record.camera_stream = Some(track.clone());
                    }
                    self.emit(RoomEvent::CameraStream { peer_id, track }).await;
                }
            },
            TransportEvent::ConnectionStateChanged(state) => {
                let Some(session) = self.sessions.get_mut(&peer_id) else {
                    return;
                };
                match session.on_connection_state(state).await {
                    Ok(Some(offer)) => self.send(ClientMessage::Offer {
                        to: peer_id.clone(),
                        sdp: offer,
                    }),
                    Ok(None) => {}
                    Err(e) => self.negotiation_failed(&peer_id, e).await,
                }
                self.emit(RoomEvent::ConnectionStateChanged { peer_id, state })
                    .await;
            }
            // Renegotiation is driven by track changes, not by the transport.
            TransportEvent::NegotiationNeeded => {
                debug!(peer = %peer_id, "Ignoring negotiation-needed");
            }
        }
    }

    async fn on_viewer_transport(&mut self, sharer_id: PeerId, event: TransportEvent) {
        match event {
            TransportEvent::IceCandidate(candidate) => {
                self.send(ClientMessage::ScreenIce {
                    to: sharer_id,
                    candidate,
                });
            }
            TransportEvent::Track(track) if track.kind() == TrackKind::Video => {
                let Some(record) = self.records.get_mut(&sharer_id) else {
                    return;
                };
                if !record.screen_subscribed {
                    return;
                }
                record.screen_stream = Some(track.clone());
                self.emit(RoomEvent::ScreenStream {
                    peer_id: sharer_id,
                    track,
                })
                .await;
            }
            TransportEvent::ConnectionStateChanged(state) if state.is_failure() => {
                warn!(sharer = %sharer_id, ?state, "Screen share connection lost");
            }
            _ => {}
        }
    }

    fn start_level_poll(&mut self, peer_id: &str, track: &MediaTrack) {
        let Some(session) = self.sessions.get_mut(peer_id) else {
            return;
        };
        let Some(meter) = self.backend.level_meter(track) else {
            debug!(peer = %peer_id, "Remote audio cannot be metered");
            return;
        };
        session.set_level_poller(LevelPoller::spawn(
            peer_id.to_string(),
            meter,
            self.settings.level_interval,
            SpeakingDetector::new(self.settings.level_threshold),
            self.level_tx.clone(),
        ));
    }

    pub(crate) async fn handle_level(&mut self, update: LevelUpdate) {
        let Some(record) = self.records.get_mut(&update.peer_id) else {
            return;
        };
        record.audio_level = update.level;
        if record.speaking != update.speaking {
            record.speaking = update.speaking;
            self.emit(RoomEvent::SpeakingChanged {
                peer_id: update.peer_id,
                speaking: update.speaking,
            })
            .await;
        }
    }

    // -- Commands -----------------------------------------------------------

    /// Returns false once the session should stop.
    pub(crate) async fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::SetMuted(muted) => {
                self.muted = muted;
                self.apply_mute();
                self.send(ClientMessage::MuteStatus { muted });
            }
            RoomCommand::SetCamera(Some(track)) => {
                self.camera = Some(track.clone());
                self.apply_track_change(TrackChange::AddVideo(track)).await;
                self.send(ClientMessage::CameraStatus { enabled: true });
            }
            RoomCommand::SetCamera(None) => {
                if self.camera.take().is_some() {
                    self.apply_track_change(TrackChange::RemoveVideo).await;
                    self.send(ClientMessage::CameraStatus { enabled: false });
                }
            }
            RoomCommand::SwitchAudioDevice(track) => self.switch_audio_device(track).await,
            RoomCommand::SetNoiseSuppression(enabled) => self.set_noise_suppression(enabled).await,
            RoomCommand::SetVadThreshold(threshold) => self.gate.set_threshold(threshold),
            RoomCommand::StartScreenShare(capture) => self.start_screen_share(capture),
            RoomCommand::StopScreenShare => self.stop_screen_share(),
            RoomCommand::Subscribe(peer_id) => {
                match self.records.get(&peer_id) {
                    None => debug!(peer = %peer_id, "Subscribe to unknown peer"),
                    Some(record) if !record.screen_sharing => {
                        debug!(peer = %peer_id, "Subscribe to peer that is not sharing")
                    }
                    Some(_) => {
                        if self.viewer.subscribe(&peer_id) {
                            self.send(ClientMessage::ScreenSubscribe { to: peer_id });
                        }
                    }
                }
            }
            RoomCommand::Unsubscribe(peer_id) => {
                if self.viewer.unsubscribe(&peer_id) {
                    if let Some(record) = self.records.get_mut(&peer_id) {
                        record.screen_subscribed = false;
                        record.screen_stream = None;
                    }
                    self.send(ClientMessage::ScreenUnsubscribe { to: peer_id });
                }
            }
            RoomCommand::Rename(name) => self.send(ClientMessage::RenameRequest { name }),
            RoomCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            RoomCommand::Leave => return false,
        }
        true
    }

    fn outgoing_audio(&self) -> &MediaTrack {
        self.gate_session
            .as_ref()
            .map(GateSession::output_track)
            .unwrap_or(&self.mic)
    }

    fn apply_mute(&self) {
        self.mic.set_enabled(!self.muted);
        self.outgoing_audio().set_enabled(!self.muted);
    }

    async fn switch_audio_device(&mut self, track: MediaTrack) {
        info!(track = %track.label(), "Switching audio device");
        self.mic = track;
        if let Some(old) = self.gate_session.take() {
            let _ = old.stop();
            if let Err(e) = self.start_gate() {
                warn!(error = %e, "Noise suppression unavailable on new device");
            }
        }
        self.apply_mute();
        let outgoing = self.outgoing_audio().clone();
        self.apply_track_change(TrackChange::Audio(outgoing)).await;
    }

    async fn set_noise_suppression(&mut self, enabled: bool) {
        if enabled == self.gate_session.is_some() {
            return;
        }
        let strategy = if enabled {
            match self.start_gate() {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!(error = %e, "Failed to enable noise suppression");
                    return;
                }
            }
        } else {
            if let Some(session) = self.gate_session.take() {
                let _ = session.stop();
            }
            "off"
        };

        self.apply_mute();
        let outgoing = self.outgoing_audio().clone();
        self.apply_track_change(TrackChange::Audio(outgoing)).await;
        self.emit(RoomEvent::NoiseSuppressionChanged { enabled, strategy })
            .await;
    }

    fn start_gate(&mut self) -> Result<&'static str, AudioError> {
        let session = self.gate.start(self.mic.clone())?;
        let strategy = session.strategy();
        self.gate_session = Some(session);
        Ok(strategy)
    }

    /// Apply `change` to every live session, then send whatever offers it
    /// produced.
    async fn apply_track_change(&mut self, change: TrackChange) {
        let mut offers = Vec::new();
        let mut failures = Vec::new();

        for (peer_id, session) in self.sessions.iter_mut() {
            if session.state() == PeerState::Closed {
                continue;
            }
            let result = match &change {
                TrackChange::Audio(track) => session.replace_audio_track(track).await,
                TrackChange::AddVideo(track) => session.add_video_track(track).await,
                TrackChange::RemoveVideo => session.remove_video_track().await,
            };
            match result {
                Ok(Some(offer)) => offers.push((peer_id.clone(), offer)),
                Ok(None) => {}
                Err(e) => failures.push((peer_id.clone(), e)),
            }
        }

        for (to, sdp) in offers {
            self.send(ClientMessage::Offer { to, sdp });
        }
        for (peer_id, e) in failures {
            self.negotiation_failed(&peer_id, e).await;
        }
    }

    fn start_screen_share(&mut self, capture: Box<dyn ScreenCapture>) {
        if let Some(previous) = self.sharer.take() {
            previous.stop();
        }
        let (sharer, ended) = ScreenSharer::new(
            self.backend.clone(),
            self.settings.ice_servers.clone(),
            self.transport_tx.clone(),
            capture,
        );
        info!(tracks = sharer.tracks().len(), "Screen share started");
        self.sharer = Some(sharer);
        self.capture_ended = ended;
        self.send(ClientMessage::ScreenStart);
    }

    fn stop_screen_share(&mut self) {
        self.capture_ended = None;
        if let Some(sharer) = self.sharer.take() {
            sharer.stop();
            self.send(ClientMessage::ScreenStop);
        }
    }

    pub(crate) async fn on_capture_ended(&mut self) {
        self.capture_ended = None;
        if self.sharer.is_none() {
            return;
        }
        info!("Screen capture ended outside the app");
        self.stop_screen_share();
        self.emit(RoomEvent::LocalScreenShareEnded).await;
    }

    // -- Helpers ------------------------------------------------------------

    /// Open the mesh connection to `peer_id`, replacing any existing one.
    async fn open_session(&mut self, peer_id: &str, initiator: bool) {
        if let Some(mut stale) = self.sessions.remove(peer_id) {
            debug!(peer = %peer_id, conn = %stale.conn_id(), "Replacing peer session");
            stale.close();
        }

        let (conn_id, connection) = match open_connection(
            &*self.backend,
            Direction::SendRecv,
            &self.settings.ice_servers,
            self.transport_tx.clone(),
        ) {
            Ok(opened) => opened,
            Err(e) => {
                self.negotiation_failed(peer_id, e).await;
                return;
            }
        };

        let mut session = PeerSession::new(peer_id, conn_id, connection, initiator);
        let audio = self.outgoing_audio().clone();
        if let Err(e) = session.attach_local_tracks(Some(&audio), self.camera.as_ref()) {
            warn!(peer = %peer_id, error = %e, "Failed to attach local tracks");
        }

        if initiator {
            match session.create_offer().await {
                Ok(offer) => self.send(ClientMessage::Offer {
                    to: peer_id.to_string(),
                    sdp: offer,
                }),
                Err(e) => self.negotiation_failed(peer_id, e).await,
            }
        }
        debug!(peer = %peer_id, conn = %conn_id, initiator, "Peer session opened");
        self.sessions.insert(peer_id.to_string(), session);
    }

    /// Re-broadcast our mute and camera state so late joiners see it.
    fn announce_local_state(&self) {
        if self.muted {
            self.send(ClientMessage::MuteStatus { muted: true });
        }
        if self.camera.is_some() {
            self.send(ClientMessage::CameraStatus { enabled: true });
        }
    }

    async fn negotiation_failed(&mut self, peer_id: &str, error: NegotiationError) {
        warn!(peer = %peer_id, error = %error, "Negotiation failed");
        self.emit(RoomEvent::NegotiationFailed {
            peer_id: peer_id.to_string(),
            error: error.to_string(),
        })
        .await;
    }

    fn send(&self, msg: ClientMessage) {
        if let Err(e) = self.signaling.send(msg) {
            debug!(error = %e, "Dropping outbound relay message");
        }
    }

    async fn emit(&mut self, event: RoomEvent) {
        let _ = self.events.send(event).await;
    }

    fn snapshot(&self) -> RoomSnapshot {
        let mut peers: Vec<PeerRecord> = self.records.values().cloned().collect();
        peers.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        RoomSnapshot {
            self_id: self.self_id.clone(),
            self_name: self.self_name.clone(),
            peers,
            muted: self.muted,
            camera_enabled: self.camera.is_some(),
            sharing_screen: self.sharer.is_some(),
            noise_suppression: self.gate_session.is_some(),
        }
    }

    fn teardown(&mut self) {
        for (_, mut session) in self.sessions.drain() {
            session.close();
        }
        self.viewer.close_all();
        if let Some(sharer) = self.sharer.take() {
            sharer.stop();
        }
        self.capture_ended = None;
        if let Some(gate) = self.gate_session.take() {
            let _ = gate.stop();
        }
        self.records.clear();
        self.signaling.close();
        info!(name = %self.self_name, "Left room");
    }
}

fn signal_sender(msg: &RelayMessage) -> Option<&PeerId> {
    match msg {
        RelayMessage::Offer { from, .. }
        | RelayMessage::Answer { from, .. }
        | RelayMessage::IceCandidate { from, .. } => Some(from),
        _ => None,
    }
}

/// Resolves when the local capture ends; never, if there is none.
async fn capture_ended(ended: &mut Option<oneshot::Receiver<()>>) {
    match ended {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable control surface for a running [`RoomSession`].
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    async fn command(&self, cmd: RoomCommand) -> Result<(), SignalingError> {
        self.tx.send(cmd).await.map_err(|_| SignalingError::Closed)
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), SignalingError> {
        self.command(RoomCommand::SetMuted(muted)).await
    }

    pub async fn set_camera(&self, track: Option<MediaTrack>) -> Result<(), SignalingError> {
        self.command(RoomCommand::SetCamera(track)).await
    }

    pub async fn switch_audio_device(&self, track: MediaTrack) -> Result<(), SignalingError> {
        self.command(RoomCommand::SwitchAudioDevice(track)).await
    }

    pub async fn set_noise_suppression(&self, enabled: bool) -> Result<(), SignalingError> {
        self.command(RoomCommand::SetNoiseSuppression(enabled)).await
    }

    pub async fn set_vad_threshold(&self, threshold: f32) -> Result<(), SignalingError> {
        self.command(RoomCommand::SetVadThreshold(threshold)).await
    }

    pub async fn start_screen_share(
        &self,
        capture: Box<dyn ScreenCapture>,
    ) -> Result<(), SignalingError> {
        self.command(RoomCommand::StartScreenShare(capture)).await
    }

    pub async fn stop_screen_share(&self) -> Result<(), SignalingError> {
        self.command(RoomCommand::StopScreenShare).await
    }

    pub async fn subscribe(&self, sharer: impl Into<PeerId>) -> Result<(), SignalingError> {
        self.command(RoomCommand::Subscribe(sharer.into())).await
    }

    pub async fn unsubscribe(&self, sharer: impl Into<PeerId>) -> Result<(), SignalingError> {
        self.command(RoomCommand::Unsubscribe(sharer.into())).await
    }

    pub async fn rename(&self, name: impl Into<String>) -> Result<(), SignalingError> {
        self.command(RoomCommand::Rename(name.into())).await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.command(RoomCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| SignalingError::Closed)
    }

    pub async fn leave(&self) -> Result<(), SignalingError> {
        self.command(RoomCommand::Leave).await
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Connect to `room_code` on the configured relay and start a session task.
pub async fn join(
    config: &HuddleConfig,
    room_code: &str,
    backend: Arc<dyn MediaBackend>,
    engine: Arc<dyn AudioEngine>,
    mic: MediaTrack,
) -> Result<(RoomHandle, mpsc::Receiver<RoomEvent>), HuddleError> {
    let timeout = Duration::from_secs(u64::from(config.room.connect_timeout_secs));
    let (signaling, inbound) =
        SignalingClient::connect(&config.room.relay_url, room_code, timeout).await?;

    let settings = RoomSettings::from_config(config);
    let (session, handle, events) =
        RoomSession::new(settings, backend, engine, mic, signaling, inbound);
    tokio::spawn(session.run());

    if config.audio.noise_suppression {
        handle.set_noise_suppression(true).await?;
    }
    info!(room = %room_code, "Room session started");
    Ok((handle, events))
}
