// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("buffer too short for {0} body")]
    BufferTooShort(&'static str),
    #[error("unexpected action {actual:#04x} in {frame} body")]
    UnexpectedAction { frame: &'static str, actual: u8 },
    #[error("Block-Ack window size {0} outside [1, 64]")]
    InvalidWindowSize(u16),
    #[error("TID {0} is not a data TID")]
    NonDataTid(u8),
}
