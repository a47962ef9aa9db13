//! Frame codec
//!
//! Building and parsing of single frames, plus a streaming decoder that
//! pulls frames out of an arbitrary byte stream and resynchronises on
//! corrupted or partial input.

use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FRAME_HEADER: [u8; 2] = [0x53, 0x59];
pub const FRAME_TAIL: [u8; 2] = [0x54, 0x43];

/// Header, control, command, length, checksum and tail with no payload
pub const MIN_FRAME_LEN: usize = 9;

/// Payload offset within a frame
const PAYLOAD_OFFSET: usize = 6;

pub const CTRL_SYSTEM: u8 = 0x01;
pub const CTRL_RANGE: u8 = 0x07;
pub const CTRL_HUMAN_PRESENCE: u8 = 0x80;
pub const CTRL_BREATH: u8 = 0x81;
pub const CTRL_SLEEP: u8 = 0x84;
pub const CTRL_HEART_RATE: u8 = 0x85;

pub const CMD_HEARTBEAT: u8 = 0x01;
pub const CMD_RANGE_STATUS: u8 = 0x07;
pub const CMD_HEART_RATE_SWITCH: u8 = 0x00;
pub const CMD_HEART_RATE_REPORT: u8 = 0x02;
pub const CMD_MOTION_INFO: u8 = 0x02;
pub const CMD_BODY_MOVEMENT: u8 = 0x03;
pub const CMD_HUMAN_DISTANCE: u8 = 0x04;
pub const CMD_HUMAN_ORIENTATION: u8 = 0x05;
pub const CMD_BREATH_VALUE: u8 = 0x02;
pub const CMD_SLEEP_COMPREHENSIVE: u8 = 0x0C;
pub const CMD_SLEEP_QUALITY: u8 = 0x0D;

/// Low byte of the sum of `bytes`
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// One protocol frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub control: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(control: u8, command: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            control,
            command,
            payload: payload.into(),
        }
    }

    /// Command that turns heart-rate reporting on or off
    pub fn heart_rate_switch(enable: bool) -> Self {
        Self::new(CTRL_HEART_RATE, CMD_HEART_RATE_SWITCH, [u8::from(enable)])
    }

    /// Total encoded length of this frame
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_LEN + self.payload.len()
    }

    /// Serialize the frame to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| FrameError::PayloadTooLarge(self.payload.len()))?;

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&FRAME_HEADER);
        buf.push(self.control);
        buf.push(self.command);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf.push(checksum(&buf));
        buf.extend_from_slice(&FRAME_TAIL);
        Ok(buf)
    }

    /// Parse a frame from the start of `buf`.
    ///
    /// Returns the frame and the number of bytes it occupied; trailing bytes
    /// are left for the caller.
    pub fn parse(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
        if buf.len() < MIN_FRAME_LEN {
            return Err(FrameError::Incomplete {
                needed: MIN_FRAME_LEN,
                available: buf.len(),
            });
        }
        if buf[..2] != FRAME_HEADER {
            return Err(FrameError::InvalidHeader(buf[0], buf[1]));
        }

        let payload_len = u16::from_be_bytes([buf[4], buf[5]]) as usize;
        let total = MIN_FRAME_LEN + payload_len;
        if buf.len() < total {
            return Err(FrameError::Incomplete {
                needed: total,
                available: buf.len(),
            });
        }

        if buf[total - 2..total] != FRAME_TAIL {
            return Err(FrameError::InvalidTail(buf[total - 2], buf[total - 1]));
        }

        let expected = checksum(&buf[..total - 3]);
        let actual = buf[total - 3];
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        let frame = Frame {
            control: buf[2],
            command: buf[3],
            payload: buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + payload_len].to_vec(),
        };
        Ok((frame, total))
    }
}

/// Streaming frame decoder.
///
/// Bytes are appended with `extend`; `next_frame` yields complete frames.
/// Garbage before a header and frames failing the tail or checksum check are
/// skipped one byte at a time so the decoder locks onto the next header.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    rejected: u64,
}

/// Upper bound on buffered bytes while waiting for a frame to complete
const MAX_BUFFERED: usize = 4096;

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_BUFFERED {
            // A corrupted length field can stall the decoder; drop the oldest bytes
            let excess = self.buffer.len() - MAX_BUFFERED;
            self.buffer.drain(..excess);
            self.rejected += 1;
        }
    }

    /// Bytes waiting for more input
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Frames or byte runs discarded during resynchronisation
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Next complete frame, or `None` when more input is needed
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let start = self.find_header()?;
            if start > 0 {
                debug!(skipped = start, "discarding bytes before frame header");
                self.buffer.drain(..start);
            }

            match Frame::parse(&self.buffer) {
                Ok((frame, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Some(frame);
                }
                Err(FrameError::Incomplete { .. }) => return None,
                Err(err) => {
                    debug!(error = %err, "rejecting frame, resynchronising");
                    self.rejected += 1;
                    self.buffer.drain(..1);
                }
            }
        }
    }

    /// Decode every complete frame currently buffered
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Offset of the first header byte pair. A lone trailing 0x53 is kept
    /// since its partner may arrive with the next read.
    fn find_header(&mut self) -> Option<usize> {
        if let Some(pos) = self.buffer.windows(2).position(|w| w == FRAME_HEADER) {
            return Some(pos);
        }
        let keep = usize::from(self.buffer.last() == Some(&FRAME_HEADER[0]));
        let discard = self.buffer.len() - keep;
        if discard > 0 {
            self.buffer.drain(..discard);
        }
        None
    }
}
