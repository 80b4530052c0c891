//! HDLC-style framing: flag-delimited, byte-stuffed frames with an
//! additive checksum, carrying bincode-encoded payloads.
//!
//! This models the framing a real serial field bus transceiver would do
//! without needing one: flag bytes mark frame boundaries, escaping hides
//! flag bytes that occur in payload data, and the checksum lets the
//! simulated link (`transport`) report realistic corruption as decode
//! failures rather than silently passing bad data through.

use thiserror::Error;

const FLAG: u8 = 0x7E;
const ESC: u8 = 0x7D;
const ESC_XOR: u8 = 0x20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame missing leading flag byte")]
    MissingLeadFlag,
    #[error("frame missing trailing flag byte")]
    MissingTrailFlag,
    #[error("frame shorter than checksum trailer")]
    Truncated,
    #[error("checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },
    #[error("dangling escape byte at end of frame")]
    DanglingEscape,
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16).rotate_left(1))
}

fn stuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        if b == FLAG || b == ESC {
            out.push(ESC);
            out.push(b ^ ESC_XOR);
        } else {
            out.push(b);
        }
    }
    out
}

fn unstuff(bytes: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(b) = iter.next() {
        if b == ESC {
            let escaped = iter.next().ok_or(FrameError::DanglingEscape)?;
            out.push(escaped ^ ESC_XOR);
        } else {
            out.push(b);
        }
    }
    Ok(out)
}

/// Wrap a payload in flag bytes, byte stuffing, and a trailing checksum.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let sum = checksum(payload);
    let mut body = payload.to_vec();
    body.extend_from_slice(&sum.to_be_bytes());
    let stuffed = stuff(&body);

    let mut frame = Vec::with_capacity(stuffed.len() + 2);
    frame.push(FLAG);
    frame.extend_from_slice(&stuffed);
    frame.push(FLAG);
    frame
}

/// Undo [`encode`], validating the checksum trailer.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    let inner = frame
        .strip_prefix(&[FLAG])
        .ok_or(FrameError::MissingLeadFlag)?;
    let inner = inner
        .strip_suffix(&[FLAG])
        .ok_or(FrameError::MissingTrailFlag)?;

    let body = unstuff(inner)?;
    if body.len() < 2 {
        return Err(FrameError::Truncated);
    }
    let (payload, trailer) = body.split_at(body.len() - 2);
    let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
    let actual = checksum(payload);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }
    Ok(payload.to_vec())
}
