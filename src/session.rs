// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Block-Ack session state and the table that owns it.
//!
//! Sessions are keyed by (peer address, TID). The table is the sole owner:
//! once a session is removed nothing else may retain it, and its reorder
//! window is consumed (flushed by the caller) before the session is dropped.
//!
//! Locking discipline: the map itself is behind a `RwLock` and every entry
//! behind its own `Mutex`, so flows for distinct sessions proceed in
//! parallel while frames for one session are processed in strict arrival
//! order. Removal marks the entry `TearingDown` under its mutex before the
//! map entry disappears; an insert racing with removal observes the state
//! and falls back to pass-through rather than touching a dead window.

use {
    crate::{
        mac::{MacAddr, ReasonCode},
        reorder::ReorderWindow,
        seq::SequenceNum,
        timer::InactivityTimer,
    },
    parking_lot::{Mutex, RwLock},
    std::collections::HashMap,
    std::sync::Arc,
};

pub type SessionKey = (MacAddr, u8);

/// A frame body parked in a reorder window awaiting in-order delivery.
#[derive(Debug, PartialEq, Eq)]
pub struct BufferedFrame {
    pub amsdu: bool,
    pub payload: Vec<u8>,
}

/// Why a session went away. Reported through `FrameSink::session_closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a DELBA. `initiated_by_peer` mirrors the frame's
    /// initiator bit.
    PeerDelba { reason: ReasonCode, initiated_by_peer: bool },
    /// The local inactivity countdown expired.
    Timeout,
    /// A new ADDBA for the same (peer, TID) replaced the session.
    Replaced,
    /// The peer disconnected and all its sessions were swept.
    PeerDisconnect,
    /// The owning interface shut down.
    Reset,
}

#[derive(Debug)]
pub(crate) enum SessionState {
    /// An ADDBA request went out and the peer's response is pending. No
    /// window exists yet; data frames pass through unordered.
    Negotiating,
    Active(ActiveState),
    /// Mid-removal. A flow that still holds the entry must treat the
    /// session as absent.
    TearingDown,
}

#[derive(Debug)]
pub(crate) struct ActiveState {
    pub window: ReorderWindow<BufferedFrame>,
    pub amsdu_supported: bool,
    pub inactivity: InactivityTimer,
    /// False until the window is anchored to a real starting sequence.
    /// Initiator-side sessions learn it from the first data frame or BAR.
    pub started: bool,
}

impl ActiveState {
    pub fn new(start_seq: SequenceNum, window_size: u16, amsdu_supported: bool, timeout_ticks: u32) -> Self {
        Self {
            window: ReorderWindow::new(start_seq, window_size),
            amsdu_supported,
            inactivity: InactivityTimer::start(timeout_ticks),
            started: true,
        }
    }

    /// An active session whose starting sequence is not yet known.
    pub fn new_unanchored(window_size: u16, amsdu_supported: bool, timeout_ticks: u32) -> Self {
        Self { started: false, ..Self::new(0, window_size, amsdu_supported, timeout_ticks) }
    }

    /// Anchors the window if this is the first sequence observed.
    pub fn anchor(&mut self, seq: SequenceNum) {
        if !self.started {
            self.window.rebase(seq);
            self.started = true;
        }
    }
}

#[derive(Debug)]
pub(crate) struct Session {
    pub tid: u8,
    pub state: SessionState,
}

impl Session {
    /// Moves the session into `TearingDown`, handing its window (if any) to
    /// the caller for flushing. After this returns no path can buffer into
    /// the session again.
    pub fn begin_teardown(&mut self) -> Option<ActiveState> {
        match std::mem::replace(&mut self.state, SessionState::TearingDown) {
            SessionState::Active(active) => Some(active),
            _ => None,
        }
    }
}

pub(crate) type SessionRef = Arc<Mutex<Session>>;

/// Owner of every Block-Ack session, keyed by (peer, TID).
#[derive(Default)]
pub(crate) struct SessionTable {
    sessions: RwLock<HashMap<SessionKey, SessionRef>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, peer: &MacAddr, tid: u8) -> Option<SessionRef> {
        self.sessions.read().get(&(*peer, tid)).cloned()
    }

    /// Installs `session` for the key, returning the displaced entry (if
    /// any) already marked `TearingDown`. The caller flushes its window; no
    /// two sessions ever coexist for one key.
    pub fn create_or_replace(&self, peer: MacAddr, tid: u8, session: Session) -> Option<ActiveState> {
        let entry = Arc::new(Mutex::new(session));
        let displaced = self.sessions.write().insert((peer, tid), entry);
        displaced.and_then(|old| old.lock().begin_teardown())
    }

    /// Removes the session for the key, handing back its window state (if it
    /// was active) for the caller to flush. Returns `None` when no session
    /// existed or teardown already began elsewhere.
    pub fn remove(&self, peer: &MacAddr, tid: u8) -> Option<ActiveState> {
        let entry = self.sessions.write().remove(&(*peer, tid));
        entry.and_then(|session| session.lock().begin_teardown())
    }

    /// Whether a (possibly still negotiating) session exists for the key.
    #[cfg(test)]
    pub fn contains(&self, peer: &MacAddr, tid: u8) -> bool {
        self.sessions.read().contains_key(&(*peer, tid))
    }

    /// Removes every session for `peer`, in unspecified order. Each returned
    /// entry carries its TID and window state for individual flushing.
    pub fn remove_all_for_peer(&self, peer: &MacAddr) -> Vec<(u8, Option<ActiveState>)> {
        let mut map = self.sessions.write();
        let keys: Vec<SessionKey> =
            map.keys().filter(|(addr, _)| addr == peer).cloned().collect();
        keys.into_iter()
            .filter_map(|key| map.remove(&key))
            .map(|session| {
                let mut session = session.lock();
                (session.tid, session.begin_teardown())
            })
            .collect()
    }

    /// Removes every session in the table. Used on interface shutdown.
    pub fn remove_all(&self) -> Vec<(MacAddr, u8, Option<ActiveState>)> {
        let mut map = self.sessions.write();
        map.drain()
            .map(|((peer, tid), session)| (peer, tid, session.lock().begin_teardown()))
            .collect()
    }

    /// Snapshot of the live entries, for the housekeeping sweep.
    pub fn entries(&self) -> Vec<(SessionKey, SessionRef)> {
        self.sessions.read().iter().map(|(key, session)| (*key, session.clone())).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::reorder::InsertResult, assert_matches::assert_matches};

    const PEER: MacAddr = [2u8; 6];

    fn active_session(tid: u8, start_seq: SequenceNum) -> Session {
        Session { tid, state: SessionState::Active(ActiveState::new(start_seq, 8, true, 0)) }
    }

    fn buffered(payload: &[u8]) -> BufferedFrame {
        BufferedFrame { amsdu: false, payload: payload.to_vec() }
    }

    #[test]
    fn replace_hands_back_displaced_window() {
        let table = SessionTable::new();
        assert!(table.create_or_replace(PEER, 0, active_session(0, 10)).is_none());

        // Park a frame in the first session's window.
        {
            let session = table.lookup(&PEER, 0).expect("no session");
            let mut session = session.lock();
            match &mut session.state {
                SessionState::Active(active) => {
                    assert_matches!(window_insert(active, 11), InsertResult::Buffered)
                }
                other => panic!("unexpected state {:?}", other),
            }
        }

        // Replacing the session hands the old window back for flushing.
        let displaced =
            table.create_or_replace(PEER, 0, active_session(0, 100)).expect("no displaced state");
        let mut window = displaced.window;
        let flushed = window.flush_all();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].0, 11);
        assert_eq!(table.len(), 1);
    }

    fn window_insert(active: &mut ActiveState, seq: SequenceNum) -> InsertResult<BufferedFrame> {
        active.window.insert(seq, buffered(b"payload"))
    }

    #[test]
    fn remove_marks_entry_torn_down() {
        let table = SessionTable::new();
        table.create_or_replace(PEER, 3, active_session(3, 0));

        // A flow that resolved the entry before removal still observes the
        // teardown afterwards.
        let stale = table.lookup(&PEER, 3).expect("no session");
        assert!(table.remove(&PEER, 3).is_some());
        assert_matches!(stale.lock().state, SessionState::TearingDown);
        assert!(table.lookup(&PEER, 3).is_none());

        // Removing again is a no-op.
        assert!(table.remove(&PEER, 3).is_none());
    }

    #[test]
    fn remove_all_for_peer_leaves_other_peers() {
        let table = SessionTable::new();
        let other: MacAddr = [9u8; 6];
        table.create_or_replace(PEER, 0, active_session(0, 0));
        table.create_or_replace(PEER, 5, active_session(5, 0));
        table.create_or_replace(other, 5, active_session(5, 0));

        let mut removed = table.remove_all_for_peer(&PEER);
        removed.sort_by_key(|&(tid, _)| tid);
        assert_eq!(removed.iter().map(|&(tid, _)| tid).collect::<Vec<_>>(), vec![0, 5]);
        assert!(removed.iter().all(|(_, state)| state.is_some()));
        assert_eq!(table.len(), 1);
        assert!(table.lookup(&other, 5).is_some());
    }

    #[test]
    fn negotiating_session_has_no_window_to_flush() {
        let table = SessionTable::new();
        table.create_or_replace(PEER, 1, Session { tid: 1, state: SessionState::Negotiating });
        assert!(table.remove(&PEER, 1).is_none());
        assert!(!table.contains(&PEER, 1));
    }

    #[test]
    fn unanchored_session_anchors_once() {
        let mut active = ActiveState::new_unanchored(8, true, 0);
        active.anchor(500);
        assert_eq!(active.window.start_seq(), 500);
        // Later sequences no longer move the anchor.
        active.anchor(700);
        assert_eq!(active.window.start_seq(), 500);
    }
}
