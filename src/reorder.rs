// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-TID sliding reorder window.
//!
//! The window is a fixed-capacity circular buffer indexed by the modular
//! offset of a frame's sequence number from `start_seq`, not a sorted
//! collection: insert and slide checks are O(1) per frame, which matters on
//! the receive hot path. Sliding is lazy and only progresses as far as
//! contiguously occupied slots permit, so a single call delivers at most
//! `size` frames.
//!
//! Invariants:
//! - a non-empty slot holds exactly the frame whose sequence number its
//!   position implies;
//! - no slot holds a frame whose modular distance from `start_seq` is
//!   `size` or more;
//! - the slot at `start_seq` is always empty, since an in-order frame is
//!   delivered without ever being buffered.

use crate::seq::{seq_add, seq_distance, SequenceNum};

/// Largest negotiable reorder window (IEEE Std 802.11-2016, 9.4.1.14 caps
/// the buffer size field at 64 for HT).
pub const MAX_WINDOW_SIZE: u16 = 64;

/// Outcome of offering one frame to the window.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult<T> {
    /// The frame (and possibly a contiguous run of previously buffered
    /// frames) is ready; entries are in strictly increasing sequence order.
    Delivered(Vec<(SequenceNum, T)>),
    /// The frame was stored to wait for an earlier missing frame.
    Buffered,
    /// The sequence was already delivered or is already buffered; the frame
    /// was dropped.
    Duplicate,
    /// The sequence lies beyond the window's far edge; the frame was
    /// dropped without mutating the window.
    OutOfWindow,
}

#[derive(Debug)]
pub struct ReorderWindow<T> {
    start_seq: SequenceNum,
    size: u16,
    /// Ring index of the slot corresponding to `start_seq`.
    head: usize,
    slots: Box<[Option<T>]>,
    full_count: u16,
}

impl<T> ReorderWindow<T> {
    pub fn new(start_seq: SequenceNum, size: u16) -> Self {
        debug_assert!(size >= 1 && size <= MAX_WINDOW_SIZE);
        let mut slots = Vec::with_capacity(size as usize);
        slots.resize_with(size as usize, || None);
        Self { start_seq, size, head: 0, slots: slots.into_boxed_slice(), full_count: 0 }
    }

    pub fn start_seq(&self) -> SequenceNum {
        self.start_seq
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn full_count(&self) -> u16 {
        self.full_count
    }

    pub fn is_empty(&self) -> bool {
        self.full_count == 0
    }

    /// Re-anchors an empty window at `start_seq`. Used when the starting
    /// sequence is only learned after establishment, e.g. from the first
    /// data frame of an initiator-side session or from a BAR that precedes
    /// any data.
    pub fn rebase(&mut self, start_seq: SequenceNum) {
        debug_assert!(self.is_empty());
        self.start_seq = start_seq;
        self.head = 0;
    }

    fn slot_index(&self, offset: u16) -> usize {
        (self.head + offset as usize) % self.size as usize
    }

    fn advance_one(&mut self) {
        self.start_seq = seq_add(self.start_seq, 1);
        self.head = (self.head + 1) % self.size as usize;
    }

    /// Delivers the contiguous run of buffered frames at the window head.
    fn drain_contiguous(&mut self, out: &mut Vec<(SequenceNum, T)>) {
        while let Some(frame) = self.slots[self.head].take() {
            self.full_count -= 1;
            out.push((self.start_seq, frame));
            self.advance_one();
        }
    }

    /// Offers one frame to the window. See [`InsertResult`] for outcomes.
    pub fn insert(&mut self, seq: SequenceNum, frame: T) -> InsertResult<T> {
        let dist = seq_distance(seq, self.start_seq);
        if dist < 0 {
            // Behind the window: the sequence was already delivered.
            return InsertResult::Duplicate;
        }
        let dist = dist as u16;
        if dist >= self.size {
            return InsertResult::OutOfWindow;
        }
        if dist == 0 {
            debug_assert!(self.slots[self.head].is_none());
            let mut out = vec![(seq, frame)];
            self.advance_one();
            self.drain_contiguous(&mut out);
            return InsertResult::Delivered(out);
        }
        let idx = self.slot_index(dist);
        if self.slots[idx].is_some() {
            return InsertResult::Duplicate;
        }
        self.slots[idx] = Some(frame);
        self.full_count += 1;
        InsertResult::Buffered
    }

    /// Advances `start_seq` to `target`, delivering buffered frames with
    /// sequence numbers modularly below `target` in increasing order, then
    /// continues the in-order cascade from the new start. Frames at or ahead
    /// of `target` keep their (shifted) slots. A target at or behind the
    /// current start is a no-op.
    pub fn force_advance(&mut self, target: SequenceNum) -> Vec<(SequenceNum, T)> {
        let mut out = Vec::new();
        let dist = seq_distance(target, self.start_seq);
        if dist <= 0 {
            return out;
        }
        let dist = dist as u16;
        for offset in 0..dist.min(self.size) {
            let idx = self.slot_index(offset);
            if let Some(frame) = self.slots[idx].take() {
                self.full_count -= 1;
                out.push((seq_add(self.start_seq, offset), frame));
            }
        }
        self.head = if dist >= self.size {
            debug_assert!(self.is_empty());
            0
        } else {
            self.slot_index(dist)
        };
        self.start_seq = target;
        self.drain_contiguous(&mut out);
        out
    }

    /// Delivers every buffered frame in increasing sequence order and
    /// empties the window. Afterwards the window restarts one past the
    /// highest delivered sequence, so further inserts behave as a fresh
    /// window.
    pub fn flush_all(&mut self) -> Vec<(SequenceNum, T)> {
        let mut out = Vec::new();
        if self.full_count == 0 {
            return out;
        }
        for offset in 0..self.size {
            let idx = self.slot_index(offset);
            if let Some(frame) = self.slots[idx].take() {
                self.full_count -= 1;
                out.push((seq_add(self.start_seq, offset), frame));
            }
        }
        debug_assert!(self.is_empty());
        if let Some(&(last, _)) = out.last() {
            self.start_seq = seq_add(last, 1);
            self.head = 0;
        }
        out
    }

    /// Delivers the first contiguous run of buffered frames past the missing
    /// head and discards everything beyond the run's trailing gap. This is
    /// the inactivity-expiry flush: a frame buffered beyond the gap does not
    /// contiguously follow from the forced-advance boundary and is dropped
    /// rather than delivered out of context.
    pub fn flush_leading_run(&mut self) -> Vec<(SequenceNum, T)> {
        let mut out = Vec::new();
        if self.full_count == 0 {
            return out;
        }
        let mut offset = 0;
        while offset < self.size && self.slots[self.slot_index(offset)].is_none() {
            offset += 1;
        }
        while offset < self.size {
            let idx = self.slot_index(offset);
            match self.slots[idx].take() {
                Some(frame) => {
                    self.full_count -= 1;
                    out.push((seq_add(self.start_seq, offset), frame));
                    offset += 1;
                }
                None => break,
            }
        }
        // Discard stale frames beyond the run's trailing gap.
        for stale in offset..self.size {
            let idx = self.slot_index(stale);
            if self.slots[idx].take().is_some() {
                self.full_count -= 1;
            }
        }
        debug_assert!(self.is_empty());
        self.start_seq = seq_add(self.start_seq, offset);
        self.head = 0;
        out
    }
}
