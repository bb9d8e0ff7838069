//! Fast concept framing
//!
//! Layout: `FMT TGT SRC [LEN] data... CS`
//!
//! The low 6 bits of FMT carry the payload length. When they are zero the
//! payload length moves to a dedicated LEN byte after the addresses.
//! CS is the byte sum of everything before it.

use super::{sum_checksum, FrameLength, Framing, Telegram};

/// Format byte with physical addressing
const FMT_ADDRESSED: u8 = 0x80;
/// Largest payload that fits into the format byte
const MAX_SHORT_LEN: usize = 0x3F;
/// Largest payload the dedicated length byte can describe
const MAX_LEN: usize = 0xFF;

/// Fast concept framing rules
#[derive(Debug, Clone, Copy, Default)]
pub struct FastFraming;

impl Framing for FastFraming {
    fn min_len(&self) -> usize {
        4
    }

    fn frame_length(&self, buf: &[u8]) -> FrameLength {
        if buf.len() < self.min_len() {
            return FrameLength::Incomplete;
        }
        match (buf[0] & 0x3F) as usize {
            0 => FrameLength::Complete(buf[3] as usize + 5),
            len => FrameLength::Complete(len + 4),
        }
    }

    fn checksum(&self, bytes: &[u8]) -> u8 {
        sum_checksum(bytes)
    }

    fn parse<'a>(&self, telegram: &'a [u8]) -> Option<Telegram<'a>> {
        if telegram.len() < self.min_len() {
            return None;
        }
        let (len, start) = match (telegram[0] & 0x3F) as usize {
            0 => (telegram[3] as usize, 4),
            len => (len, 3),
        };
        if telegram.len() != start + len + 1 {
            return None;
        }
        Some(Telegram {
            target: telegram[1],
            source: telegram[2],
            data: &telegram[start..start + len],
        })
    }

    fn build(&self, target: u8, source: u8, data: &[u8]) -> Vec<u8> {
        let data = &data[..data.len().min(MAX_LEN)];
        let mut out = Vec::with_capacity(data.len() + 5);

        if data.is_empty() || data.len() > MAX_SHORT_LEN {
            out.extend_from_slice(&[FMT_ADDRESSED, target, source, data.len() as u8]);
        } else {
            out.extend_from_slice(&[FMT_ADDRESSED | data.len() as u8, target, source]);
        }
        out.extend_from_slice(data);
        out.push(self.checksum(&out));
        out
    }

    fn negative_payload(&self, data: &[u8]) -> Vec<u8> {
        // serviceNotSupported
        vec![0x7F, data.first().copied().unwrap_or(0x00), 0x11]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_length_in_format_byte() {
        assert_eq!(
            FastFraming.frame_length(&[0x82, 0x12, 0xF1, 0x1A]),
            FrameLength::Complete(6)
        );
    }

    #[test]
    fn test_explicit_length_byte() {
        assert_eq!(
            FastFraming.frame_length(&[0x80, 0x12, 0xF1, 0x40]),
            FrameLength::Complete(0x45)
        );
    }

    #[test]
    fn test_high_bits_ignored() {
        assert_eq!(
            FastFraming.frame_length(&[0xC3, 0x12, 0xF1, 0x22]),
            FrameLength::Complete(7)
        );
    }

    #[test]
    fn test_build_tester_present() {
        let tel = FastFraming.build(0x12, 0xF1, &[0x3E]);
        let cs = 0x81u8.wrapping_add(0x12).wrapping_add(0xF1).wrapping_add(0x3E);
        assert_eq!(tel, vec![0x81, 0x12, 0xF1, 0x3E, cs]);
    }

    #[test]
    fn test_build_long_payload_uses_length_byte() {
        let data = vec![0x55; 70];
        let tel = FastFraming.build(0x12, 0xF1, &data);
        assert_eq!(tel[0], 0x80);
        assert_eq!(tel[3], 70);
        assert_eq!(tel.len(), 75);
        assert_eq!(FastFraming.frame_length(&tel), FrameLength::Complete(75));
    }

    #[test]
    fn test_build_empty_payload() {
        let tel = FastFraming.build(0x12, 0xF1, &[]);
        assert_eq!(tel.len(), 5);
        assert_eq!(FastFraming.frame_length(&tel), FrameLength::Complete(5));
        assert_eq!(FastFraming.parse(&tel).unwrap().data, &[] as &[u8]);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(FastFraming.parse(&[0x82, 0x12, 0xF1, 0x1A, 0x80]).is_none());
    }

    #[test]
    fn test_reply_swaps_addresses() {
        let req = FastFraming.build(0x12, 0xF1, &[0x3E]);
        let parsed = FastFraming.parse(&req).unwrap();
        let resp = FastFraming.reply(&parsed, &[0x7E]);
        assert_eq!(&resp[..4], &[0x81, 0xF1, 0x12, 0x7E]);
    }

    #[test]
    fn test_negative_payload() {
        assert_eq!(FastFraming.negative_payload(&[0x1A, 0x80]), vec![0x7F, 0x1A, 0x11]);
    }
}
