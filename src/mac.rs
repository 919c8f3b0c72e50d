// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Block-Ack MAC boundary types.
//!
//! This module owns every bit-packed field the engine consumes: the ADDBA,
//! DELBA, and BAR bodies are decoded here, once, into plain structured
//! values, so no mask arithmetic reaches the reordering logic.
//!
//! Frame layouts follow IEEE Std 802.11-2016, 9.6.5.2 through 9.6.5.4
//! (ADDBA request/response, DELBA) and 9.3.1.8 (BlockAckReq). Bodies do
//! **not** include the management action category byte; that value is parsed
//! and removed by the transport beforehand.

use {
    crate::{error::Error, seq::SequenceNum},
    bitfield::bitfield,
    zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned},
};

pub type MacAddr = [u8; 6];

/// Data TIDs are [0, 7]; [8, 15] identify parameterized traffic categories
/// which never carry a Block-Ack reorder flow in this design.
pub fn is_data_tid(tid: u8) -> bool {
    tid <= 7
}

// IEEE Std 802.11-2016, 9.6.5.1
#[repr(C)]
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct BlockAckAction(pub u8);

impl BlockAckAction {
    pub const ADDBA_REQUEST: Self = Self(0);
    pub const ADDBA_RESPONSE: Self = Self(1);
    pub const DELBA: Self = Self(2);
}

// IEEE Std 802.11-2016, 9.4.1.7
#[repr(C)]
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct ReasonCode(pub u16);

impl ReasonCode {
    pub const UNSPECIFIED_REASON: Self = Self(1);
    pub const REASON_INACTIVITY: Self = Self(4);
    pub const STA_LEAVING: Self = Self(36);
    /// Peer no longer wants to use the Block-Ack mechanism.
    pub const END_TS_BA_DLS: Self = Self(37);
    pub const UNKNOWN_TS_BA: Self = Self(38);
    /// Locally generated on session inactivity expiry.
    pub const TIMEOUT: Self = Self(39);
}

// IEEE Std 802.11-2016, 9.4.1.9
#[repr(C)]
#[derive(AsBytes, FromBytes, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const UNSPECIFIED_FAILURE: Self = Self(1);
    pub const REQUEST_DECLINED: Self = Self(37);
    pub const INVALID_PARAMETERS: Self = Self(38);
}

bitfield! {
    /// Block Ack Parameter Set (IEEE Std 802.11-2016, 9.4.1.14).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct BlockAckParamSet(u16);
    impl Debug;
    pub amsdu_supported, set_amsdu_supported: 0;
    pub immediate_policy, set_immediate_policy: 1;
    pub u8, tid, set_tid: 5, 2;
    pub u16, buffer_size, set_buffer_size: 15, 6;
}

bitfield! {
    /// DELBA Parameter Set (IEEE Std 802.11-2016, 9.4.1.16).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct DelbaParamSet(u16);
    impl Debug;
    pub initiator, set_initiator: 11;
    pub u8, tid, set_tid: 15, 12;
}

bitfield! {
    /// Block Ack Starting Sequence Control (IEEE Std 802.11-2016, 9.3.1.8).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct BlockAckSeqControl(u16);
    impl Debug;
    pub u8, frag_num, set_frag_num: 3, 0;
    pub u16, seq_num, set_seq_num: 15, 4;
}

bitfield! {
    /// BAR Control (IEEE Std 802.11-2016, 9.3.1.8).
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct BarControl(u16);
    impl Debug;
    pub ack_policy, set_ack_policy: 0;
    pub multi_tid, set_multi_tid: 1;
    pub compressed_bitmap, set_compressed_bitmap: 2;
    pub u8, tid, set_tid: 15, 12;
}

// IEEE Std 802.11-2016, 9.6.5.2
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct AddbaReqBody {
    pub action: BlockAckAction,
    pub dialog_token: u8,
    pub parameters: u16,
    pub timeout: u16,
    pub starting_seq_ctrl: u16,
}

// IEEE Std 802.11-2016, 9.6.5.3
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct AddbaRespBody {
    pub action: BlockAckAction,
    pub dialog_token: u8,
    pub status: StatusCode,
    pub parameters: u16,
    pub timeout: u16,
}

// IEEE Std 802.11-2016, 9.6.5.4
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct DelbaBody {
    pub action: BlockAckAction,
    pub parameters: u16,
    pub reason_code: ReasonCode,
}

// IEEE Std 802.11-2016, 9.3.1.8. The fixed part of a BlockAckReq frame body
// after the MAC addresses; the (multi-TID) variable part is not used by this
// design.
#[derive(FromBytes, AsBytes, Unaligned, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct BarBody {
    pub control: u16,
    pub starting_seq_ctrl: u16,
}

/// An ADDBA request after boundary decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddbaRequest {
    pub dialog_token: u8,
    pub tid: u8,
    pub buffer_size: u16,
    pub amsdu_supported: bool,
    pub timeout: u16,
    pub starting_seq: SequenceNum,
}

/// An ADDBA response after boundary decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddbaResponse {
    pub dialog_token: u8,
    pub status: StatusCode,
    pub tid: u8,
    pub buffer_size: u16,
    pub amsdu_supported: bool,
    pub timeout: u16,
}

/// A DELBA after boundary decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delba {
    pub tid: u8,
    pub initiator: bool,
    pub reason_code: ReasonCode,
}

/// A BlockAckReq after boundary decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAckReq {
    pub tid: u8,
    pub starting_seq: SequenceNum,
}

fn read_body<T: FromBytes + Unaligned>(body: &[u8], frame: &'static str) -> Result<T, Error>
where
    T: Copy,
{
    LayoutVerified::<_, T>::new_unaligned_from_prefix(body)
        .map(|(view, _)| *view)
        .ok_or(Error::BufferTooShort(frame))
}

fn check_action(frame: &'static str, actual: BlockAckAction, expected: BlockAckAction) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::UnexpectedAction { frame, actual: actual.0 })
    }
}

/// Reads an ADDBA request from an action frame body.
///
/// # Errors
///
/// Returns an error if the body is too short or carries the wrong action.
pub fn parse_addba_req(body: &[u8]) -> Result<AddbaRequest, Error> {
    let raw: AddbaReqBody = read_body(body, "ADDBA request")?;
    check_action("ADDBA request", { raw.action }, BlockAckAction::ADDBA_REQUEST)?;
    let params = BlockAckParamSet({ raw.parameters });
    let ssc = BlockAckSeqControl({ raw.starting_seq_ctrl });
    Ok(AddbaRequest {
        dialog_token: raw.dialog_token,
        tid: params.tid(),
        buffer_size: params.buffer_size(),
        amsdu_supported: params.amsdu_supported(),
        timeout: { raw.timeout },
        starting_seq: ssc.seq_num(),
    })
}

/// Reads an ADDBA response from an action frame body.
pub fn parse_addba_resp(body: &[u8]) -> Result<AddbaResponse, Error> {
    let raw: AddbaRespBody = read_body(body, "ADDBA response")?;
    check_action("ADDBA response", { raw.action }, BlockAckAction::ADDBA_RESPONSE)?;
    let params = BlockAckParamSet({ raw.parameters });
    Ok(AddbaResponse {
        dialog_token: raw.dialog_token,
        status: { raw.status },
        tid: params.tid(),
        buffer_size: params.buffer_size(),
        amsdu_supported: params.amsdu_supported(),
        timeout: { raw.timeout },
    })
}

/// Reads a DELBA from an action frame body.
pub fn parse_delba(body: &[u8]) -> Result<Delba, Error> {
    let raw: DelbaBody = read_body(body, "DELBA")?;
    check_action("DELBA", { raw.action }, BlockAckAction::DELBA)?;
    let params = DelbaParamSet({ raw.parameters });
    Ok(Delba { tid: params.tid(), initiator: params.initiator(), reason_code: { raw.reason_code } })
}

/// Reads the fixed part of a BlockAckReq control frame body.
pub fn parse_bar(body: &[u8]) -> Result<BlockAckReq, Error> {
    let raw: BarBody = read_body(body, "BlockAckReq")?;
    let control = BarControl({ raw.control });
    let ssc = BlockAckSeqControl({ raw.starting_seq_ctrl });
    Ok(BlockAckReq { tid: control.tid(), starting_seq: ssc.seq_num() })
}
