//! Sharer side of the overlay.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_common::{ConnectionId, IceCandidate, MediaTrack, NegotiationError, PeerId, SessionDescription};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::types::ShareEdge;
use crate::transport::{open_connection, Direction, MediaBackend, ScreenCapture, TaggedEvent};

/// Owns a running capture and fans it out to subscribers.
pub struct ScreenSharer {
    backend: Arc<dyn MediaBackend>,
    ice_servers: Vec<String>,
    sink: mpsc::UnboundedSender<TaggedEvent>,
    capture: Box<dyn ScreenCapture>,
    edges: HashMap<PeerId, ShareEdge>,
}

impl ScreenSharer {
    /// Start sharing `capture`. The returned receiver resolves if the
    /// capture ends on its own.
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        ice_servers: Vec<String>,
        sink: mpsc::UnboundedSender<TaggedEvent>,
        mut capture: Box<dyn ScreenCapture>,
    ) -> (Self, Option<oneshot::Receiver<()>>) {
        let ended = capture.take_ended();
        let sharer = Self {
            backend,
            ice_servers,
            sink,
            capture,
            edges: HashMap::new(),
        };
        (sharer, ended)
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.capture.tracks()
    }

    pub fn subscribers(&self) -> impl Iterator<Item = &PeerId> {
        self.edges.keys()
    }

    pub fn has_subscriber(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn edge_for(&self, conn_id: ConnectionId) -> Option<&PeerId> {
        self.edges
            .iter()
            .find(|(_, edge)| edge.conn_id == conn_id)
            .map(|(id, _)| id)
    }

    /// Open a fresh edge to `id` and return the offer for it. Any previous
    /// edge to the same subscriber is closed first.
    pub async fn add_subscriber(&mut self, id: &str) -> Result<SessionDescription, NegotiationError> {
        if let Some(stale) = self.edges.remove(id) {
            debug!(subscriber = %id, conn = %stale.conn_id, "Replacing stale share edge");
            stale.close();
        }

        let (conn_id, connection) = open_connection(
            &*self.backend,
            Direction::SendOnly,
            &self.ice_servers,
            self.sink.clone(),
        )?;
        let edge = ShareEdge::new(conn_id, connection);

        for track in self.capture.tracks() {
            edge.connection.add_track(&track)?;
        }
        let offer = edge.connection.create_offer().await?;
        edge.connection.set_local_description(offer.clone()).await?;

        info!(subscriber = %id, conn = %conn_id, "Screen share subscriber added");
        self.edges.insert(id.to_string(), edge);
        Ok(offer)
    }

    /// Returns whether an edge existed.
    pub fn remove_subscriber(&mut self, id: &str) -> bool {
        match self.edges.remove(id) {
            Some(edge) => {
                edge.close();
                info!(subscriber = %id, "Screen share subscriber removed");
                true
            }
            None => false,
        }
    }

    pub async fn handle_answer(
        &self,
        id: &str,
        answer: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let edge = self
            .edges
            .get(id)
            .ok_or_else(|| NegotiationError::UnknownEdge(id.to_string()))?;
        edge.connection.set_remote_description(answer).await
    }

    /// Returns false if there is no edge to `id`.
    pub async fn add_ice_candidate(&self, id: &str, candidate: IceCandidate) -> bool {
        let Some(edge) = self.edges.get(id) else {
            return false;
        };
        if let Err(e) = edge.connection.add_ice_candidate(candidate).await {
            warn!(subscriber = %id, error = %e, "Failed to add share ICE candidate");
        }
        true
    }

    /// Close every edge and stop the capture.
    pub fn stop(self) {
        info!(subscribers = self.edges.len(), "Screen share stopped");
    }
}

impl Drop for ScreenSharer {
    fn drop(&mut self) {
        for (_, edge) in self.edges.drain() {
            edge.close();
        }
        self.capture.stop();
    }
}
