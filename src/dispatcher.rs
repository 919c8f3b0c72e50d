// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ingress dispatch for the receive path.
//!
//! The engine classifies each inbound unit and routes it to the reorder
//! window of the matching Block-Ack session, or straight upward when no
//! session claims the flow. Frames that do not belong to an Active session
//! are never reordered, and no call here blocks: every handler returns
//! having delivered zero or more frames or dropped its input as
//! duplicate/out-of-window.
//!
//! Deliveries for one session happen under that session's lock, which keeps
//! the upward sequence strictly increasing per flow even when multiple
//! transport threads feed the engine. The sink must not call back into the
//! engine.

use {
    crate::{
        mac::{is_data_tid, MacAddr},
        reorder::InsertResult,
        seq::SequenceNum,
        session::{BufferedFrame, CloseReason, SessionState, SessionTable},
    },
    log::debug,
};

/// Upper collaborator of the reorder engine.
///
/// Types implementing this trait receive every in-order frame and the
/// session lifecycle notifications. Implementations handle their own
/// synchronization; `deliver` is invoked in strictly increasing sequence
/// order per (peer, TID) session.
pub trait FrameSink {
    /// Hands one data frame upward. Called once per frame, in order.
    fn deliver(&self, peer: &MacAddr, tid: u8, seq: SequenceNum, amsdu: bool, payload: &[u8]);

    /// A Block-Ack session was established for the flow.
    fn session_established(&self, peer: &MacAddr, tid: u8, window_size: u16);

    /// A Block-Ack session went away. Diagnostics only; frames for the flow
    /// pass through unordered from here on.
    fn session_closed(&self, peer: &MacAddr, tid: u8, reason: CloseReason);
}

/// The 802.11n receive-reordering engine for one interface.
///
/// All state lives in memory and is scoped to the engine's lifetime. Frames
/// for one (peer, TID) flow must be fed in transport arrival order; flows
/// for distinct sessions may be fed concurrently.
pub struct ReorderEngine<S> {
    pub(crate) sink: S,
    pub(crate) table: SessionTable,
    pub(crate) inactivity_timeout_ticks: u32,
}

impl<S: FrameSink> ReorderEngine<S> {
    /// Creates an engine delivering through `sink`. Sessions idle for
    /// `inactivity_timeout_ticks` housekeeping ticks are torn down; zero
    /// disables the timeout.
    pub fn new(sink: S, inactivity_timeout_ticks: u32) -> Self {
        Self { sink, table: SessionTable::new(), inactivity_timeout_ticks }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Accepts one data frame from the transport.
    pub fn on_data_frame(
        &self,
        peer: &MacAddr,
        tid: u8,
        seq: SequenceNum,
        amsdu: bool,
        payload: Vec<u8>,
    ) {
        if !is_data_tid(tid) {
            self.sink.deliver(peer, tid, seq, amsdu, &payload);
            return;
        }
        let session = match self.table.lookup(peer, tid) {
            Some(session) => session,
            None => {
                self.sink.deliver(peer, tid, seq, amsdu, &payload);
                return;
            }
        };
        let mut session = session.lock();
        let active = match &mut session.state {
            SessionState::Active(active) => active,
            // Still negotiating, or lost a race with teardown: the flow has
            // no reorder responsibility, deliver unbuffered.
            _ => {
                self.sink.deliver(peer, tid, seq, amsdu, &payload);
                return;
            }
        };
        if amsdu && !active.amsdu_supported {
            debug!(
                "dropping A-MSDU frame seq {} from {:02x?} tid {}: not negotiated",
                seq, peer, tid
            );
            return;
        }
        active.anchor(seq);
        match active.window.insert(seq, BufferedFrame { amsdu, payload }) {
            InsertResult::Delivered(run) => {
                active.inactivity.reset();
                self.deliver_run(peer, tid, run);
            }
            InsertResult::Buffered => active.inactivity.reset(),
            InsertResult::Duplicate => {
                debug!("dropping duplicate frame seq {} from {:02x?} tid {}", seq, peer, tid);
            }
            InsertResult::OutOfWindow => {
                debug!("dropping out-of-window frame seq {} from {:02x?} tid {}", seq, peer, tid);
            }
        }
    }

    pub(crate) fn deliver_run(
        &self,
        peer: &MacAddr,
        tid: u8,
        run: Vec<(SequenceNum, BufferedFrame)>,
    ) {
        for (seq, frame) in run {
            self.sink.deliver(peer, tid, seq, frame.amsdu, &frame.payload);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use {super::*, parking_lot::Mutex};

    #[derive(Debug, PartialEq, Eq)]
    pub enum SinkEvent {
        Deliver { peer: MacAddr, tid: u8, seq: SequenceNum, amsdu: bool, payload: Vec<u8> },
        Established { peer: MacAddr, tid: u8, window_size: u16 },
        Closed { peer: MacAddr, tid: u8, reason: CloseReason },
    }

    /// Records every upward call for inspection, in the order made.
    #[derive(Default)]
    pub struct FakeSink {
        pub events: Mutex<Vec<SinkEvent>>,
    }

    impl FrameSink for FakeSink {
        fn deliver(&self, peer: &MacAddr, tid: u8, seq: SequenceNum, amsdu: bool, payload: &[u8]) {
            self.events.lock().push(SinkEvent::Deliver {
                peer: *peer,
                tid,
                seq,
                amsdu,
                payload: payload.to_vec(),
            });
        }

        fn session_established(&self, peer: &MacAddr, tid: u8, window_size: u16) {
            self.events.lock().push(SinkEvent::Established { peer: *peer, tid, window_size });
        }

        fn session_closed(&self, peer: &MacAddr, tid: u8, reason: CloseReason) {
            self.events.lock().push(SinkEvent::Closed { peer: *peer, tid, reason });
        }
    }

    pub fn test_engine() -> ReorderEngine<FakeSink> {
        ReorderEngine::new(FakeSink::default(), 0)
    }

    pub fn drain_events(engine: &ReorderEngine<FakeSink>) -> Vec<SinkEvent> {
        engine.sink.events.lock().drain(..).collect()
    }

    pub fn delivered_seqs(events: &[SinkEvent]) -> Vec<SequenceNum> {
        events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Deliver { seq, .. } => Some(*seq),
                _ => None,
            })
            .collect()
    }
}
