//! In-memory media backend, audio engine, and screen capture for tests.
//!
//! Connections record every call and follow the offer/answer state rules
//! closely enough to catch glare and double offers. Tests inject transport
//! events with [`FakeConnection::emit`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle_audio::{AudioEngine, BlockProcessor, ProcessingNode, ProcessingPrimitive};
use huddle_common::{
    AudioError, IceCandidate, MediaTrack, NegotiationError, SdpType, SessionDescription, TrackKind,
};
use tokio::sync::{mpsc, oneshot};

use crate::transport::{
    ConnectionConfig, Direction, LevelMeter, MediaBackend, MediaConnection, ScreenCapture,
    SenderId, SignalingState, TransportEvent, TransportEvents,
};

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddIce(String),
    AddTrack(TrackKind, String),
    RemoveTrack,
    ReplaceTrack(Option<String>),
    Close,
}

pub(crate) struct FakeConnection {
    pub(crate) direction: Direction,
    calls: Mutex<Vec<Call>>,
    signaling: Mutex<SignalingState>,
    senders: Mutex<HashMap<u64, MediaTrack>>,
    next_sender: AtomicU64,
    closed: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl FakeConnection {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn offers(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateOffer))
    }

    pub(crate) fn answers(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateAnswer))
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Tracks currently attached to senders.
    pub(crate) fn sending(&self) -> Vec<MediaTrack> {
        let senders = self.senders.lock().unwrap();
        let mut ids: Vec<_> = senders.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().map(|id| senders[id].clone()).collect()
    }

    pub(crate) fn sending_kind(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.sending().into_iter().filter(|t| t.kind() == kind).collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_open(&self) -> Result<(), NegotiationError> {
        if self.is_closed() {
            Err(NegotiationError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaConnection for FakeConnection {
    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        self.check_open()?;
        self.record(Call::CreateOffer);
        let n = self.offers();
        Ok(SessionDescription::offer(format!("v=0 offer {n}")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        self.check_open()?;
        if *self.signaling.lock().unwrap() != SignalingState::HaveRemoteOffer {
            return Err(NegotiationError::Transport("no remote offer".into()));
        }
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::answer("v=0 answer"))
    }

    async fn set_local_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.check_open()?;
        self.record(Call::SetLocal(desc.sdp_type));
        let mut state = self.signaling.lock().unwrap();
        *state = match desc.sdp_type {
            SdpType::Offer => SignalingState::HaveLocalOffer,
            _ => SignalingState::Stable,
        };
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.check_open()?;
        self.record(Call::SetRemote(desc.sdp_type));
        let mut state = self.signaling.lock().unwrap();
        *state = match (desc.sdp_type, *state) {
            (SdpType::Offer, _) => SignalingState::HaveRemoteOffer,
            (SdpType::Answer, SignalingState::HaveLocalOffer) => SignalingState::Stable,
            (SdpType::Answer, _) => {
                return Err(NegotiationError::Transport("answer without offer".into()))
            }
            _ => SignalingState::Stable,
        };
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        self.check_open()?;
        self.record(Call::AddIce(candidate.candidate));
        Ok(())
    }

    fn add_track(&self, track: &MediaTrack) -> Result<SenderId, NegotiationError> {
        self.check_open()?;
        self.record(Call::AddTrack(track.kind(), track.id().to_string()));
        let id = self.next_sender.fetch_add(1, Ordering::SeqCst);
        self.senders.lock().unwrap().insert(id, track.clone());
        Ok(SenderId(id))
    }

    fn remove_track(&self, sender: SenderId) -> Result<(), NegotiationError> {
        self.check_open()?;
        self.record(Call::RemoveTrack);
        self.senders.lock().unwrap().remove(&sender.0);
        Ok(())
    }

    async fn replace_track(
        &self,
        sender: SenderId,
        track: Option<MediaTrack>,
    ) -> Result<(), NegotiationError> {
        self.check_open()?;
        self.record(Call::ReplaceTrack(track.as_ref().map(|t| t.id().to_string())));
        let mut senders = self.senders.lock().unwrap();
        match track {
            Some(track) => {
                senders.insert(sender.0, track);
            }
            None => {
                senders.remove(&sender.0);
            }
        }
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        if self.is_closed() {
            SignalingState::Closed
        } else {
            *self.signaling.lock().unwrap()
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.record(Call::Close);
            // Dropping the sender ends the event pump.
            self.events.lock().unwrap().take();
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    connections: Arc<Mutex<Vec<Arc<FakeConnection>>>>,
    levels: Arc<Mutex<HashMap<String, Arc<AtomicU32>>>>,
}

impl FakeBackend {
    pub(crate) fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> Arc<FakeConnection> {
        self.connections().last().cloned().expect("no connection created")
    }

    pub(crate) fn open_count(&self) -> usize {
        self.connections().iter().filter(|c| !c.is_closed()).count()
    }

    pub(crate) fn set_level(&self, track: &MediaTrack, level: f32) {
        self.level_cell(track).store(level.to_bits(), Ordering::Relaxed);
    }

    fn level_cell(&self, track: &MediaTrack) -> Arc<AtomicU32> {
        self.levels
            .lock()
            .unwrap()
            .entry(track.id().to_string())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .clone()
    }
}

impl MediaBackend for FakeBackend {
    fn create_connection(
        &self,
        config: &ConnectionConfig,
    ) -> Result<(Arc<dyn MediaConnection>, TransportEvents), NegotiationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(FakeConnection {
            direction: config.direction,
            calls: Mutex::new(Vec::new()),
            signaling: Mutex::new(SignalingState::Stable),
            senders: Mutex::new(HashMap::new()),
            next_sender: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            events: Mutex::new(Some(tx)),
        });
        self.connections.lock().unwrap().push(conn.clone());
        Ok((conn, rx))
    }

    fn level_meter(&self, track: &MediaTrack) -> Option<Box<dyn LevelMeter>> {
        Some(Box::new(FakeMeter(self.level_cell(track))))
    }
}

struct FakeMeter(Arc<AtomicU32>);

impl LevelMeter for FakeMeter {
    fn level(&mut self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

// ---------------------------------------------------------------------------
// Audio engine
// ---------------------------------------------------------------------------

/// Engine that accepts the worklet primitive and keeps processors idle.
#[derive(Default)]
pub(crate) struct FakeEngine {
    pub(crate) unsupported: bool,
    live: Arc<AtomicU64>,
}

impl FakeEngine {
    pub(crate) fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Default::default()
        }
    }

    /// Processors attached and not yet released.
    pub(crate) fn live_nodes(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }
}

struct FakeNode {
    output: MediaTrack,
    processor: Option<BlockProcessor>,
    live: Arc<AtomicU64>,
}

impl ProcessingNode for FakeNode {
    fn output(&self) -> MediaTrack {
        self.output.clone()
    }

    fn release(&mut self) {
        if self.processor.take().is_some() {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl AudioEngine for FakeEngine {
    fn supports(&self, primitive: ProcessingPrimitive) -> bool {
        !self.unsupported && primitive == ProcessingPrimitive::Worklet
    }

    fn attach(
        &self,
        _primitive: ProcessingPrimitive,
        source: &MediaTrack,
        processor: BlockProcessor,
    ) -> Result<Box<dyn ProcessingNode>, AudioError> {
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeNode {
            output: MediaTrack::audio(format!("gated {}", source.label())),
            processor: Some(processor),
            live: self.live.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Screen capture
// ---------------------------------------------------------------------------

pub(crate) struct FakeCapture {
    tracks: Vec<MediaTrack>,
    stopped: Arc<AtomicBool>,
    ended: Option<oneshot::Receiver<()>>,
}

/// Test-side controls for a [`FakeCapture`].
pub(crate) struct CaptureControl {
    pub(crate) track: MediaTrack,
    pub(crate) stopped: Arc<AtomicBool>,
    pub(crate) end: Option<oneshot::Sender<()>>,
}

impl CaptureControl {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Simulate the user ending the capture from outside the app.
    pub(crate) fn end(&mut self) {
        if let Some(tx) = self.end.take() {
            let _ = tx.send(());
        }
    }
}

impl FakeCapture {
    pub(crate) fn new() -> (Self, CaptureControl) {
        let track = MediaTrack::video("screen");
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let capture = Self {
            tracks: vec![track.clone()],
            stopped: stopped.clone(),
            ended: Some(rx),
        };
        let control = CaptureControl {
            track,
            stopped,
            end: Some(tx),
        };
        (capture, control)
    }
}

impl ScreenCapture for FakeCapture {
    fn tracks(&self) -> Vec<MediaTrack> {
        self.tracks.clone()
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn take_ended(&mut self) -> Option<oneshot::Receiver<()>> {
        self.ended.take()
    }
}
