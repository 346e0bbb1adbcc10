//! Types shared by both sides of the overlay.

use std::sync::Arc;

use huddle_common::ConnectionId;

use crate::transport::MediaConnection;

/// One overlay connection, sharer-to-subscriber or sharer-to-viewer.
pub struct ShareEdge {
    pub conn_id: ConnectionId,
    pub(crate) connection: Arc<dyn MediaConnection>,
}

impl ShareEdge {
    pub(crate) fn new(conn_id: ConnectionId, connection: Arc<dyn MediaConnection>) -> Self {
        Self {
            conn_id,
            connection,
        }
    }

    pub(crate) fn close(&self) {
        self.connection.close();
    }
}

impl Drop for ShareEdge {
    fn drop(&mut self) {
        self.connection.close();
    }
}
