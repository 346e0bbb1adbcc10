//! Viewer side of the overlay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use huddle_common::{ConnectionId, IceCandidate, NegotiationError, PeerId, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::ShareEdge;
use crate::transport::{open_connection, Direction, MediaBackend, TaggedEvent};

/// Tracks which sharers we watch and the inbound edge to each.
pub struct ScreenViewer {
    backend: Arc<dyn MediaBackend>,
    ice_servers: Vec<String>,
    sink: mpsc::UnboundedSender<TaggedEvent>,
    subscribed: HashSet<PeerId>,
    edges: HashMap<PeerId, ShareEdge>,
}

impl ScreenViewer {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        ice_servers: Vec<String>,
        sink: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            backend,
            ice_servers,
            sink,
            subscribed: HashSet::new(),
            edges: HashMap::new(),
        }
    }

    pub fn is_subscribed(&self, sharer: &str) -> bool {
        self.subscribed.contains(sharer)
    }

    pub fn edge_for(&self, conn_id: ConnectionId) -> Option<&PeerId> {
        self.edges
            .iter()
            .find(|(_, edge)| edge.conn_id == conn_id)
            .map(|(id, _)| id)
    }

    /// Returns true if this is a new subscription (a `screen-subscribe` is due).
    pub fn subscribe(&mut self, sharer: &str) -> bool {
        let added = self.subscribed.insert(sharer.to_string());
        if added {
            info!(sharer = %sharer, "Subscribed to screen share");
        }
        added
    }

    /// Returns true if a subscription was dropped (a `screen-unsubscribe`
    /// is due). Unsubscribing twice sends nothing the second time.
    pub fn unsubscribe(&mut self, sharer: &str) -> bool {
        let removed = self.subscribed.remove(sharer);
        if let Some(edge) = self.edges.remove(sharer) {
            edge.close();
        }
        if removed {
            info!(sharer = %sharer, "Unsubscribed from screen share");
        }
        removed
    }

    /// Forget a sharer that stopped or left. Nothing is sent.
    pub fn close(&mut self, sharer: &str) -> bool {
        let had_edge = self.edges.remove(sharer).is_some();
        self.subscribed.remove(sharer) || had_edge
    }

    /// Answer a sharer's offer on a fresh inbound edge.
    pub async fn handle_offer(
        &mut self,
        sharer: &str,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        if !self.subscribed.contains(sharer) {
            debug!(sharer = %sharer, "Unsolicited screen offer");
            return Err(NegotiationError::UnknownEdge(sharer.to_string()));
        }
        if let Some(stale) = self.edges.remove(sharer) {
            stale.close();
        }

        let (conn_id, connection) = open_connection(
            &*self.backend,
            Direction::RecvOnly,
            &self.ice_servers,
            self.sink.clone(),
        )?;
        let edge = ShareEdge::new(conn_id, connection);
        edge.connection.set_remote_description(offer).await?;
        let answer = edge.connection.create_answer().await?;
        edge.connection.set_local_description(answer.clone()).await?;

        debug!(sharer = %sharer, conn = %conn_id, "Answered screen offer");
        self.edges.insert(sharer.to_string(), edge);
        Ok(answer)
    }

    /// Returns false if there is no edge to `sharer`.
    pub async fn add_ice_candidate(&self, sharer: &str, candidate: IceCandidate) -> bool {
        let Some(edge) = self.edges.get(sharer) else {
            return false;
        };
        if let Err(e) = edge.connection.add_ice_candidate(candidate).await {
            warn!(sharer = %sharer, error = %e, "Failed to add viewer ICE candidate");
        }
        true
    }

    pub fn close_all(&mut self) {
        self.subscribed.clear();
        for (_, edge) in self.edges.drain() {
            edge.close();
        }
    }
}
