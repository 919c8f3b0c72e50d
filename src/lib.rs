// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This crate implements the receive side of 802.11n Block-Ack: frames that
//! arrive out of order due to aggregation and retransmission are delivered
//! upward in correct sequence per (peer, TID) flow, with bounded latency and
//! no duplicate or stale delivery. The transport feeds decoded frames into
//! [`ReorderEngine`]; in-order frames and session lifecycle notifications
//! come back out through the [`FrameSink`] trait.
//!
//! The engine owns session negotiation (ADDBA/DELBA), per-session reorder
//! windows over the 12-bit sequence space, BAR-driven window recovery, and
//! tick-driven inactivity teardown. Transport framing, firmware command
//! channels, and everything else device-specific stay outside; see the
//! [`mac`] module for the boundary where bit-packed Block-Ack fields are
//! decoded into structured values.
//!
//! See IEEE Std 802.11-2016, 10.24.

mod block_ack;
mod dispatcher;
pub mod error;
pub mod mac;
mod reorder;
pub mod seq;
mod session;
mod timer;

pub use crate::{
    block_ack::AddbaDecision,
    dispatcher::{FrameSink, ReorderEngine},
    error::Error,
    reorder::{InsertResult, ReorderWindow, MAX_WINDOW_SIZE},
    session::CloseReason,
};
