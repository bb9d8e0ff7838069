//! KWP2000 style framing
//!
//! Layout: `FMT TGT SRC LEN data... CS`, the length byte is always present.

use super::{sum_checksum, FrameLength, Framing, Telegram};

const FMT_ADDRESSED: u8 = 0x80;
const MAX_LEN: usize = 0xFF;

/// KWP2000 style framing rules
#[derive(Debug, Clone, Copy, Default)]
pub struct Kwp2000sFraming;

impl Framing for Kwp2000sFraming {
    fn min_len(&self) -> usize {
        4
    }

    fn frame_length(&self, buf: &[u8]) -> FrameLength {
        if buf.len() < self.min_len() {
            return FrameLength::Incomplete;
        }
        FrameLength::Complete(buf[3] as usize + 5)
    }

    fn checksum(&self, bytes: &[u8]) -> u8 {
        sum_checksum(bytes)
    }

    fn parse<'a>(&self, telegram: &'a [u8]) -> Option<Telegram<'a>> {
        if telegram.len() < self.min_len() {
            return None;
        }
        let len = telegram[3] as usize;
        if telegram.len() != len + 5 {
            return None;
        }
        Some(Telegram {
            target: telegram[1],
            source: telegram[2],
            data: &telegram[4..4 + len],
        })
    }

    fn build(&self, target: u8, source: u8, data: &[u8]) -> Vec<u8> {
        let data = &data[..data.len().min(MAX_LEN)];
        let mut out = Vec::with_capacity(data.len() + 5);
        out.extend_from_slice(&[FMT_ADDRESSED, target, source, data.len() as u8]);
        out.extend_from_slice(data);
        out.push(self.checksum(&out));
        out
    }

    fn negative_payload(&self, data: &[u8]) -> Vec<u8> {
        vec![0x7F, data.first().copied().unwrap_or(0x00), 0x11]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_from_length_byte() {
        assert_eq!(
            Kwp2000sFraming.frame_length(&[0x80, 0x12, 0xF1, 0x02]),
            FrameLength::Complete(7)
        );
    }

    #[test]
    fn test_format_bits_do_not_carry_length() {
        // Unlike the fast concept, low bits of FMT are not a length
        assert_eq!(
            Kwp2000sFraming.frame_length(&[0x83, 0x12, 0xF1, 0x01]),
            FrameLength::Complete(6)
        );
    }

    #[test]
    fn test_build_and_parse() {
        let tel = Kwp2000sFraming.build(0x12, 0xF1, &[0x1A, 0x80]);
        assert_eq!(&tel[..6], &[0x80, 0x12, 0xF1, 0x02, 0x1A, 0x80]);
        assert_eq!(tel.len(), 7);
        let parsed = Kwp2000sFraming.parse(&tel).unwrap();
        assert_eq!(parsed.target, 0x12);
        assert_eq!(parsed.source, 0xF1);
        assert_eq!(parsed.data, &[0x1A, 0x80]);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut tel = Kwp2000sFraming.build(0x12, 0xF1, &[0x3E]);
        *tel.last_mut().unwrap() ^= 0xFF;
        assert!(!Kwp2000sFraming.checksum_ok(&tel));
    }
}
