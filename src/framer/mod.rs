//! Telegram framing per protocol concept
//!
//! A concept fixes how a telegram header encodes its length, how the
//! checksum is computed and which line settings the port uses:
//! - **fast**: `FMT TGT SRC [LEN] data CS`, 115200 8N1
//! - **kwp2000s**: `FMT TGT SRC LEN data CS`, 9600 8E1
//! - **ds2**: `ADDR LEN data CS`, 9600 8E1
//!
//! Call sites only go through [`Concept::framing`] and the free functions
//! below, so every concept shares one signature.
//!
//! # Adding a new concept
//!
//! 1. Create `framer/my_concept.rs`
//! 2. Implement the `Framing` trait
//! 3. Add the variant to `Concept` and its arm in `framing()`, `line()`
//!    and `timing()`

pub mod ds2;
pub mod fast;
pub mod kwp2000s;

pub use ds2::Ds2Framing;
pub use fast::FastFraming;
pub use kwp2000s::Kwp2000sFraming;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Result of reading a telegram header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLength {
    /// Header is readable, telegram spans this many bytes
    Complete(usize),
    /// Not enough bytes to read the header yet
    Incomplete,
    /// Header can never describe a valid telegram
    Malformed,
}

/// Decoded view of a single telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telegram<'a> {
    pub target: u8,
    pub source: u8,
    /// Payload between header and checksum (service id first)
    pub data: &'a [u8],
}

/// Framing rules of one protocol concept
pub trait Framing: Send + Sync {
    /// Bytes needed before the header length can be read
    fn min_len(&self) -> usize;

    /// Total telegram length described by the header at the start of `buf`
    fn frame_length(&self, buf: &[u8]) -> FrameLength;

    /// Checksum over all bytes preceding the checksum byte
    fn checksum(&self, bytes: &[u8]) -> u8;

    /// Split a complete telegram into addresses and payload
    fn parse<'a>(&self, telegram: &'a [u8]) -> Option<Telegram<'a>>;

    /// Build a complete telegram including header and checksum
    fn build(&self, target: u8, source: u8, data: &[u8]) -> Vec<u8>;

    /// Payload rejecting the request payload `data`
    fn negative_payload(&self, data: &[u8]) -> Vec<u8>;

    /// Build the answer to `request`, addressed back to its sender
    fn reply(&self, request: &Telegram<'_>, data: &[u8]) -> Vec<u8> {
        self.build(request.source, request.target, data)
    }

    /// Check the trailing checksum byte
    fn checksum_ok(&self, telegram: &[u8]) -> bool {
        match telegram.split_last() {
            Some((&cs, body)) => self.checksum(body) == cs,
            None => false,
        }
    }
}

/// Sum of all bytes, modulo 256
pub(crate) fn sum_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// XOR of all bytes
pub(crate) fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

// =============================================================================
// Concept
// =============================================================================

/// Request/response protocol family emulated for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Concept {
    /// Length-prefixed fast concept
    #[default]
    Fast,
    /// KWP2000 style with a dedicated length byte
    Kwp2000s,
    /// DS2 style, length byte counts the whole telegram
    Ds2,
}

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
}

/// Serial line parameters fixed by the concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub parity: Parity,
}

/// Response pacing fixed by the concept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Delay between a confirmed request and the first response telegram
    pub response_delay: Duration,
    /// Delay between consecutive response telegrams
    pub inter_telegram: Duration,
}

static FAST: FastFraming = FastFraming;
static KWP2000S: Kwp2000sFraming = Kwp2000sFraming;
static DS2: Ds2Framing = Ds2Framing;

impl Concept {
    pub const ALL: [Concept; 3] = [Concept::Fast, Concept::Kwp2000s, Concept::Ds2];

    /// Framing rules for this concept
    pub fn framing(self) -> &'static dyn Framing {
        match self {
            Self::Fast => &FAST,
            Self::Kwp2000s => &KWP2000S,
            Self::Ds2 => &DS2,
        }
    }

    /// Line parameters for this concept
    pub fn line(self) -> LineSettings {
        match self {
            Self::Fast => LineSettings {
                baud_rate: 115_200,
                parity: Parity::None,
            },
            Self::Kwp2000s | Self::Ds2 => LineSettings {
                baud_rate: 9_600,
                parity: Parity::Even,
            },
        }
    }

    /// Response pacing for this concept
    pub fn timing(self) -> Timing {
        match self {
            Self::Fast => Timing {
                response_delay: Duration::ZERO,
                inter_telegram: Duration::from_millis(2),
            },
            Self::Kwp2000s => Timing {
                response_delay: Duration::from_millis(25),
                inter_telegram: Duration::from_millis(10),
            },
            Self::Ds2 => Timing {
                response_delay: Duration::from_millis(10),
                inter_telegram: Duration::from_millis(10),
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Kwp2000s => "kwp2000s",
            Self::Ds2 => "ds2",
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Concept {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "kwp2000s" | "kwp2000" => Ok(Self::Kwp2000s),
            "ds2" => Ok(Self::Ds2),
            other => Err(format!(
                "unknown concept '{}' (expected fast, kwp2000s or ds2)",
                other
            )),
        }
    }
}

// =============================================================================
// Framing operations
// =============================================================================

/// Length of the telegram starting at `offset` in `buf`
pub fn frame_length(buf: &[u8], offset: usize, concept: Concept) -> FrameLength {
    match buf.get(offset..) {
        Some(rest) => concept.framing().frame_length(rest),
        None => FrameLength::Incomplete,
    }
}

/// Telegrams split out of a concatenated buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation {
    pub telegrams: Vec<Bytes>,
    /// Bytes covered by `telegrams`
    pub consumed: usize,
}

impl Segmentation {
    /// True when the telegrams cover the whole buffer
    pub fn is_exact(&self, total: usize) -> bool {
        self.consumed == total
    }
}

/// Split `buf` into consecutive telegrams
///
/// Stops at a tail of 0-1 bytes, at an unreadable header, or at a
/// telegram that would overrun the buffer. Compare `consumed` with the
/// buffer length to detect an inexact split.
pub fn segment(buf: &Bytes, concept: Concept) -> Segmentation {
    let framing = concept.framing();
    let mut telegrams = Vec::new();
    let mut offset = 0;

    while offset + 1 < buf.len() {
        let len = match framing.frame_length(&buf[offset..]) {
            FrameLength::Complete(n) if n > 0 => n,
            _ => break,
        };
        if offset + len > buf.len() {
            break;
        }
        telegrams.push(buf.slice(offset..offset + len));
        offset += len;
    }

    Segmentation {
        telegrams,
        consumed: offset,
    }
}

// =============================================================================
// Tests
// =============================================================================
