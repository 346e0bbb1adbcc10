//! Room membership and message routing.
//!
//! A `Room` is plain synchronous state: every operation runs to completion
//! while the caller holds the room's lock, so roster changes and the frames
//! they produce are ordered identically for every member. `RoomStore` maps
//! room codes to rooms and drops a room once its last member leaves.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use huddle_common::{new_id, ClientMessage, PeerId, RelayMessage, RosterEntry};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::names::{disambiguate, generate_name, sanitize};

/// Frames a member may have queued before it counts as stalled.
pub const MEMBER_QUEUE: usize = 256;

/// Outbound frame queue of one connected member.
pub type MemberTx = mpsc::Sender<String>;

struct Member {
    id: PeerId,
    name: String,
    tx: MemberTx,
}

/// Membership table of one room. Holds no media state.
pub struct Room {
    code: String,
    /// Join order is kept; the roster in `welcome` follows it.
    members: Vec<Member>,
    screen_sharers: HashSet<PeerId>,
    max_name_len: usize,
    /// Members whose queue overflowed during the current operation.
    stalled: Vec<PeerId>,
}

impl Room {
    pub fn new(code: impl Into<String>, max_name_len: usize) -> Self {
        Self {
            code: code.into(),
            members: Vec::new(),
            screen_sharers: HashSet::new(),
            max_name_len,
            stalled: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.member(id).map(|m| m.name.as_str())
    }

    /// Register a new member under a generated name.
    pub fn connect(&mut self, tx: MemberTx) -> PeerId {
        let base = generate_name(&mut rand::thread_rng());
        self.connect_as(&base, tx)
    }

    /// Register a new member, disambiguating `base` against the roster.
    ///
    /// The newcomer gets `welcome` with everyone already present; everyone
    /// else gets `join`.
    pub fn connect_as(&mut self, base: &str, tx: MemberTx) -> PeerId {
        let id = new_id();
        let name = disambiguate(
            base,
            self.members.iter().map(|m| m.name.as_str()),
            self.max_name_len,
        );

        let peers: Vec<RosterEntry> = self
            .members
            .iter()
            .map(|m| RosterEntry {
                id: m.id.clone(),
                name: m.name.clone(),
                screen_sharing: self.screen_sharers.contains(&m.id),
            })
            .collect();

        self.members.push(Member {
            id: id.clone(),
            name: name.clone(),
            tx,
        });

        self.send_to(
            &id,
            &RelayMessage::Welcome {
                peer_id: id.clone(),
                name: name.clone(),
                peers,
            },
        );
        self.broadcast(
            &RelayMessage::Join {
                peer_id: id.clone(),
                name: name.clone(),
            },
            Some(&id),
        );

        info!(room = %self.code, peer = %id, name = %name, members = self.members.len(), "Peer joined");
        self.evict_stalled();
        id
    }

    /// Apply one parsed message from `sender`.
    pub fn handle(&mut self, sender: &str, msg: ClientMessage) {
        if self.member(sender).is_none() {
            debug!(room = %self.code, peer = %sender, "Message from unregistered peer dropped");
            return;
        }

        self.apply(sender, msg);
        self.evict_stalled();
    }

    fn apply(&mut self, sender: &str, msg: ClientMessage) {
        match msg {
            ClientMessage::RenameRequest { name } => self.rename(sender, &name),
            ClientMessage::MuteStatus { muted } => self.broadcast(
                &RelayMessage::MuteStatus {
                    peer_id: sender.to_string(),
                    muted,
                },
                Some(sender),
            ),
            ClientMessage::CameraStatus { enabled } => self.broadcast(
                &RelayMessage::CameraStatus {
                    peer_id: sender.to_string(),
                    enabled,
                },
                Some(sender),
            ),
            ClientMessage::ScreenStart => {
                self.screen_sharers.insert(sender.to_string());
                info!(room = %self.code, peer = %sender, "Screen share started");
                self.broadcast(
                    &RelayMessage::ScreenStart {
                        peer_id: sender.to_string(),
                    },
                    Some(sender),
                );
            }
            ClientMessage::ScreenStop => {
                self.screen_sharers.remove(sender);
                info!(room = %self.code, peer = %sender, "Screen share stopped");
                self.broadcast(
                    &RelayMessage::ScreenStop {
                        peer_id: sender.to_string(),
                    },
                    Some(sender),
                );
            }
            targeted => {
                if let Some((to, routed)) = targeted.into_targeted(sender) {
                    if !self.send_to(&to, &routed) {
                        debug!(room = %self.code, from = %sender, to = %to, "Target not in room, dropped");
                    }
                }
            }
        }
    }

    /// Remove a member. A departing sharer's `screen-stop` goes out before
    /// its `leave`.
    pub fn disconnect(&mut self, id: &str) {
        self.remove_member(id);
        self.evict_stalled();
    }

    fn remove_member(&mut self, id: &str) {
        let Some(pos) = self.members.iter().position(|m| m.id == id) else {
            return;
        };
        let member = self.members.remove(pos);

        if self.screen_sharers.remove(id) {
            self.broadcast(
                &RelayMessage::ScreenStop {
                    peer_id: id.to_string(),
                },
                None,
            );
        }
        self.broadcast(
            &RelayMessage::Leave {
                peer_id: id.to_string(),
                name: Some(member.name.clone()),
            },
            None,
        );

        info!(room = %self.code, peer = %id, name = %member.name, members = self.members.len(), "Peer left");
    }

    fn rename(&mut self, sender: &str, requested: &str) {
        let mut base = sanitize(requested, self.max_name_len);
        if base.is_empty() {
            base = generate_name(&mut rand::thread_rng());
        }
        let name = disambiguate(
            &base,
            self.members
                .iter()
                .filter(|m| m.id != sender)
                .map(|m| m.name.as_str()),
            self.max_name_len,
        );

        let Some(member) = self.members.iter_mut().find(|m| m.id == sender) else {
            return;
        };
        if member.name == name {
            debug!(room = %self.code, peer = %sender, "Rename is a no-op");
            return;
        }
        member.name = name.clone();

        info!(room = %self.code, peer = %sender, name = %name, "Peer renamed");
        self.broadcast(
            &RelayMessage::Rename {
                peer_id: sender.to_string(),
                name,
            },
            None,
        );
    }

    /// Drop members that stopped draining their queue. Each removal
    /// broadcasts `leave`, which may stall someone else in turn.
    fn evict_stalled(&mut self) {
        while let Some(id) = self.stalled.pop() {
            if self.member(&id).is_some() {
                warn!(room = %self.code, peer = %id, "Outbound queue full, dropping peer");
                self.remove_member(&id);
            }
        }
    }

    fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Queue a frame for one member. Returns false if it is not in the room.
    fn send_to(&mut self, id: &str, msg: &RelayMessage) -> bool {
        let Some(member) = self.members.iter().find(|m| m.id == id) else {
            return false;
        };
        match msg.encode() {
            Ok(json) => {
                if !enqueue(member, json) {
                    self.stalled.push(member.id.clone());
                }
            }
            Err(e) => warn!(room = %self.code, error = %e, "Failed to encode frame"),
        }
        true
    }

    fn broadcast(&mut self, msg: &RelayMessage, except: Option<&str>) {
        let json = match msg.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(room = %self.code, error = %e, "Failed to encode frame");
                return;
            }
        };
        for member in &self.members {
            if Some(member.id.as_str()) == except {
                continue;
            }
            if !enqueue(member, json.clone()) {
                self.stalled.push(member.id.clone());
            }
        }
    }
}

/// Returns false when the member's queue is full.
fn enqueue(member: &Member, json: String) -> bool {
    match member.tx.try_send(json) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => false,
        // A closed queue means the member is mid-disconnect.
        Err(TrySendError::Closed(_)) => true,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Room registry shared by every connection task.
#[derive(Clone)]
pub struct RoomStore {
    rooms: Arc<Mutex<HashMap<String, Arc<Mutex<Room>>>>>,
    max_name_len: usize,
}

impl RoomStore {
    pub fn new(max_name_len: usize) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            max_name_len,
        }
    }

    /// Join (creating if needed) the room `code`.
    pub async fn join(&self, code: &str, tx: MemberTx) -> (Arc<Mutex<Room>>, PeerId) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .entry(code.to_string())
            .or_insert_with(|| {
                info!(room = %code, "Room created");
                Arc::new(Mutex::new(Room::new(code, self.max_name_len)))
            })
            .clone();
        let id = room.lock().await.connect(tx);
        (room, id)
    }

    /// Leave `room`, dropping it from the registry when it empties.
    pub async fn leave(&self, room: &Arc<Mutex<Room>>, id: &str) {
        let mut rooms = self.rooms.lock().await;
        let mut guard = room.lock().await;
        guard.disconnect(id);
        if guard.is_empty() {
            let code = guard.code().to_string();
            if rooms.get(&code).is_some_and(|r| Arc::ptr_eq(r, room)) {
                rooms.remove(&code);
                info!(room = %code, "Room closed (empty)");
            }
        }
    }

    /// Number of live rooms.
    pub async fn count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
