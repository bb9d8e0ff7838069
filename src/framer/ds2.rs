//! DS2 style framing
//!
//! Layout: `ADDR LEN data... CS`
//!
//! LEN counts the whole telegram including address, length and checksum
//! bytes. CS is the XOR of everything before it. There is no separate
//! source address, the ECU answers with its own address.

use super::{xor_checksum, FrameLength, Framing, Telegram};

/// Address, length and checksum bytes
const OVERHEAD: usize = 3;
const MAX_LEN: usize = 0xFF;

/// DS2 style framing rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Ds2Framing;

impl Framing for Ds2Framing {
    fn min_len(&self) -> usize {
        2
    }

    fn frame_length(&self, buf: &[u8]) -> FrameLength {
        if buf.len() < self.min_len() {
            return FrameLength::Incomplete;
        }
        match buf[1] as usize {
            len if len < OVERHEAD => FrameLength::Malformed,
            len => FrameLength::Complete(len),
        }
    }

    fn checksum(&self, bytes: &[u8]) -> u8 {
        xor_checksum(bytes)
    }

    fn parse<'a>(&self, telegram: &'a [u8]) -> Option<Telegram<'a>> {
        match self.frame_length(telegram) {
            FrameLength::Complete(len) if len == telegram.len() => Some(Telegram {
                target: telegram[0],
                source: telegram[0],
                data: &telegram[2..len - 1],
            }),
            _ => None,
        }
    }

    fn build(&self, target: u8, _source: u8, data: &[u8]) -> Vec<u8> {
        let data = &data[..data.len().min(MAX_LEN - OVERHEAD)];
        let mut out = Vec::with_capacity(data.len() + OVERHEAD);
        out.extend_from_slice(&[target, (data.len() + OVERHEAD) as u8]);
        out.extend_from_slice(data);
        out.push(self.checksum(&out));
        out
    }

    fn negative_payload(&self, _data: &[u8]) -> Vec<u8> {
        // Status byte: rejected
        vec![0xA2]
    }
}
