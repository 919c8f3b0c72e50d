// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Block-Ack session lifecycle.
//!
//! Sessions are negotiated with an exchange of ADDBA frames and end on a
//! DELBA, on inactivity expiry, or when the peer (or the whole interface)
//! goes away. The side that requests a session is the _initiator_ and its
//! peer the _recipient_; this engine creates a reorder window on both paths,
//! since either way it owns in-order delivery for the flow.
//!
//! See IEEE Std 802.11-2016, 10.24.

use {
    crate::{
        dispatcher::{FrameSink, ReorderEngine},
        error::Error,
        mac::{is_data_tid, MacAddr, ReasonCode, StatusCode},
        reorder::MAX_WINDOW_SIZE,
        seq::SequenceNum,
        session::{ActiveState, CloseReason, Session, SessionState},
    },
    log::{debug, info, warn},
};

/// Outcome of an ADDBA request, handed back to the transport so it can
/// write the ADDBA response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddbaDecision {
    Accept { window_size: u16 },
    Reject { status: StatusCode },
}

/// Validates the negotiable parameters of an ADDBA request and returns the
/// window size this side is willing to operate.
fn negotiate_window(tid: u8, requested_window_size: u16) -> Result<u16, Error> {
    if !is_data_tid(tid) {
        return Err(Error::NonDataTid(tid));
    }
    if requested_window_size == 0 || requested_window_size > MAX_WINDOW_SIZE {
        return Err(Error::InvalidWindowSize(requested_window_size));
    }
    Ok(requested_window_size)
}

impl<S: FrameSink> ReorderEngine<S> {
    /// Handles an ADDBA request from a peer (this side is the recipient).
    ///
    /// On acceptance the session is created Active with its window anchored
    /// at the request's starting sequence number, replacing (and flushing)
    /// any session already negotiated for the key.
    pub fn on_addba_request(
        &self,
        peer: &MacAddr,
        tid: u8,
        requested_window_size: u16,
        amsdu_supported: bool,
        starting_seq: SequenceNum,
    ) -> AddbaDecision {
        let window_size = match negotiate_window(tid, requested_window_size) {
            Ok(window_size) => window_size,
            Err(error) => {
                warn!("rejecting ADDBA request from {:02x?} tid {}: {}", peer, tid, error);
                return AddbaDecision::Reject { status: StatusCode::INVALID_PARAMETERS };
            }
        };
        let session = Session {
            tid,
            state: SessionState::Active(ActiveState::new(
                starting_seq,
                window_size,
                amsdu_supported,
                self.inactivity_timeout_ticks,
            )),
        };
        self.replace_session(peer, tid, session);
        info!(
            "established Block-Ack session with {:02x?} tid {}: window size {}, start {}",
            peer, tid, window_size, starting_seq
        );
        self.sink.session_established(peer, tid, window_size);
        AddbaDecision::Accept { window_size }
    }

    /// Records a locally initiated ADDBA request (this side is the
    /// initiator). Until the peer's response arrives the flow stays
    /// unordered.
    pub fn start_negotiation(&self, peer: &MacAddr, tid: u8) -> Result<(), Error> {
        if !is_data_tid(tid) {
            return Err(Error::NonDataTid(tid));
        }
        self.replace_session(peer, tid, Session { tid, state: SessionState::Negotiating });
        Ok(())
    }

    /// Handles the peer's ADDBA response for a negotiation this side
    /// started. A zero window size is a refusal and aborts the negotiation;
    /// anything above the maximum is clamped.
    pub fn on_addba_response(
        &self,
        peer: &MacAddr,
        tid: u8,
        negotiated_window_size: u16,
        amsdu_supported: bool,
    ) {
        let session = match self.table.lookup(peer, tid) {
            Some(session) => session,
            None => {
                debug!("ignoring ADDBA response from {:02x?} tid {}: no session", peer, tid);
                return;
            }
        };
        {
            let mut session = session.lock();
            match session.state {
                SessionState::Negotiating => {}
                _ => {
                    debug!(
                        "ignoring ADDBA response from {:02x?} tid {}: not negotiating",
                        peer, tid
                    );
                    return;
                }
            }
            if negotiated_window_size == 0 {
                warn!("peer {:02x?} refused Block-Ack for tid {}", peer, tid);
                session.state = SessionState::TearingDown;
            } else {
                let window_size = negotiated_window_size.min(MAX_WINDOW_SIZE);
                // The response carries no starting sequence; the window
                // anchors to the first data frame or BAR for the flow.
                session.state = SessionState::Active(ActiveState::new_unanchored(
                    window_size,
                    amsdu_supported,
                    self.inactivity_timeout_ticks,
                ));
                info!(
                    "established Block-Ack session with {:02x?} tid {}: window size {}",
                    peer, tid, window_size
                );
                self.sink.session_established(peer, tid, window_size);
                return;
            }
        }
        // Refusal path: the entry was marked torn down above, now unlink it.
        let _ = self.table.remove(peer, tid);
    }

    /// Handles a DELBA from the peer. The session's window is flushed in
    /// order before the session goes away; subsequent frames for the flow
    /// pass through unordered.
    pub fn on_delba(&self, peer: &MacAddr, tid: u8, reason_code: ReasonCode, initiated_by_peer: bool) {
        match self.table.remove(peer, tid) {
            Some(mut active) => {
                let flushed = active.window.flush_all();
                self.deliver_run(peer, tid, flushed);
                info!(
                    "closed Block-Ack session with {:02x?} tid {}: DELBA reason {}",
                    peer, tid, reason_code.0
                );
                self.sink.session_closed(
                    peer,
                    tid,
                    CloseReason::PeerDelba { reason: reason_code, initiated_by_peer },
                );
            }
            None => {
                debug!("ignoring DELBA from {:02x?} tid {}: no active session", peer, tid);
            }
        }
    }

    /// Handles a BlockAckReq: the peer gave up retransmitting everything
    /// below `target_seq`, so the window advances there, releasing whatever
    /// became deliverable, and normal insertion resumes.
    pub fn on_bar_frame(&self, peer: &MacAddr, tid: u8, target_seq: SequenceNum) {
        if !is_data_tid(tid) {
            debug!("ignoring BAR for non-data tid {}", tid);
            return;
        }
        let session = match self.table.lookup(peer, tid) {
            Some(session) => session,
            None => {
                debug!("ignoring BAR from {:02x?} tid {}: no session", peer, tid);
                return;
            }
        };
        let mut session = session.lock();
        match &mut session.state {
            SessionState::Active(active) => {
                active.anchor(target_seq);
                let flushed = active.window.force_advance(target_seq);
                active.inactivity.reset();
                self.deliver_run(peer, tid, flushed);
            }
            _ => debug!("ignoring BAR from {:02x?} tid {}: session not active", peer, tid),
        }
    }

    /// Sweeps every session for a disconnecting peer.
    pub fn on_peer_disconnect(&self, peer: &MacAddr) {
        for (tid, state) in self.table.remove_all_for_peer(peer) {
            if let Some(mut active) = state {
                let flushed = active.window.flush_all();
                self.deliver_run(peer, tid, flushed);
                self.sink.session_closed(peer, tid, CloseReason::PeerDisconnect);
            }
        }
    }

    /// Tears down every session. Used when the owning interface shuts down.
    pub fn reset(&self) {
        for (peer, tid, state) in self.table.remove_all() {
            if let Some(mut active) = state {
                let flushed = active.window.flush_all();
                self.deliver_run(&peer, tid, flushed);
                self.sink.session_closed(&peer, tid, CloseReason::Reset);
            }
        }
    }

    /// Advances every session's inactivity countdown by one housekeeping
    /// interval and tears down the expired ones. An expired session delivers
    /// the leading run of its buffered frames; frames beyond the first gap
    /// are stale and dropped.
    pub fn on_tick(&self) {
        let mut expired = Vec::new();
        for ((peer, tid), session) in self.table.entries() {
            let mut session = session.lock();
            let expired_now = match &mut session.state {
                SessionState::Active(active) => {
                    active.inactivity.tick();
                    active.inactivity.expired()
                }
                _ => false,
            };
            if expired_now {
                if let Some(active) = session.begin_teardown() {
                    expired.push((peer, tid, active));
                }
            }
        }
        for (peer, tid, mut active) in expired {
            // The entry is already marked torn down; unlink it from the map.
            let _ = self.table.remove(&peer, tid);
            let flushed = active.window.flush_leading_run();
            self.deliver_run(&peer, tid, flushed);
            warn!(
                "Block-Ack session with {:02x?} tid {} timed out (reason {})",
                peer,
                tid,
                ReasonCode::TIMEOUT.0
            );
            self.sink.session_closed(&peer, tid, CloseReason::Timeout);
        }
    }

    /// Installs `session`, flushing and reporting any displaced one.
    fn replace_session(&self, peer: &MacAddr, tid: u8, session: Session) {
        if let Some(mut displaced) = self.table.create_or_replace(*peer, tid, session) {
            let flushed = displaced.window.flush_all();
            self.deliver_run(peer, tid, flushed);
            self.sink.session_closed(peer, tid, CloseReason::Replaced);
        }
    }
}
