//! Synthesized responses for requests not covered by the response table
//!
//! Values are derived from a [`VehicleSnapshot`] taken when the request
//! arrives, so flag changes apply to the very next answer.
//!
//! Jobs (payload level, service id first):
//!
//! | Concept          | Request     | Answer                                   |
//! |------------------|-------------|------------------------------------------|
//! | fast, kwp2000s   | `3E`        | `7E`                                     |
//! | fast, kwp2000s   | `22 F4 0D`  | `62 F4 0D <km/h>`                        |
//! | fast, kwp2000s   | `22 F4 0C`  | `62 F4 0C <rpm*4 hi> <rpm*4 lo>`         |
//! | fast, kwp2000s   | `22 40 00`  | `62 40 00 <ignition>`                    |
//! | ds2              | `0B`        | `A0 <km/h> <rpm hi> <rpm lo> <ignition>` |

use super::VehicleSnapshot;
use crate::framer::{Concept, Telegram};
use std::time::{Duration, Instant};

const SID_TESTER_PRESENT: u8 = 0x3E;
const SID_READ_DATA_BY_ID: u8 = 0x22;
const POSITIVE_OFFSET: u8 = 0x40;

const DID_VEHICLE_SPEED: [u8; 2] = [0xF4, 0x0D];
const DID_ENGINE_SPEED: [u8; 2] = [0xF4, 0x0C];
const DID_IGNITION: [u8; 2] = [0x40, 0x00];

const DS2_STATUS_BLOCK: u8 = 0x0B;
const DS2_ACK: u8 = 0xA0;

/// Terminal status byte reported with ignition on
const IGNITION_ON: u8 = 0x05;
const IGNITION_OFF: u8 = 0x00;

const CRUISE_SPEED_KMH: i32 = 50;
const SPEED_SWING_KMH: i32 = 20;
const IDLE_RPM: i32 = 800;
const DRIVING_RPM: i32 = 2000;
const RPM_SWING: i32 = 200;

/// Period of the variable value sweep
const SWEEP_PERIOD: Duration = Duration::from_secs(10);

/// Builds answers from the vehicle state
#[derive(Debug, Clone)]
pub struct Synthesizer {
    started: Instant,
}

impl Synthesizer {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Response payload for `request`, or `None` if no job matches
    pub fn respond(
        &self,
        concept: Concept,
        request: &Telegram<'_>,
        vehicle: VehicleSnapshot,
    ) -> Option<Vec<u8>> {
        let readings = Readings::sample(vehicle, self.started.elapsed());
        match concept {
            Concept::Fast | Concept::Kwp2000s => respond_kwp(request.data, &readings),
            Concept::Ds2 => respond_ds2(request.data, &readings),
        }
    }
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated sensor values at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Readings {
    speed_kmh: u8,
    rpm: u16,
    ignition: u8,
}

impl Readings {
    fn sample(vehicle: VehicleSnapshot, elapsed: Duration) -> Self {
        let sweep = |amplitude| {
            if vehicle.variable_values {
                triangle(elapsed, amplitude)
            } else {
                0
            }
        };

        let speed = if vehicle.moving {
            CRUISE_SPEED_KMH + sweep(SPEED_SWING_KMH)
        } else {
            0
        };
        let rpm = match (vehicle.ignition_ok, vehicle.moving) {
            (false, _) => 0,
            (true, false) => IDLE_RPM + sweep(RPM_SWING),
            (true, true) => DRIVING_RPM + sweep(RPM_SWING),
        };

        Self {
            speed_kmh: speed.clamp(0, u8::MAX as i32) as u8,
            rpm: rpm.clamp(0, u16::MAX as i32) as u16,
            ignition: if vehicle.ignition_ok {
                IGNITION_ON
            } else {
                IGNITION_OFF
            },
        }
    }
}

/// Triangle wave in `-amplitude..=amplitude` over `SWEEP_PERIOD`
fn triangle(elapsed: Duration, amplitude: i32) -> i32 {
    let period = SWEEP_PERIOD.as_millis() as i64;
    let phase = (elapsed.as_millis() as i64) % period;
    let half = period / 2;
    let amp = amplitude as i64;
    let rising = if phase < half { phase } else { period - phase };
    ((rising * 4 * amp) / period - amp) as i32
}

fn respond_kwp(data: &[u8], r: &Readings) -> Option<Vec<u8>> {
    let (&sid, args) = data.split_first()?;
    match sid {
        SID_TESTER_PRESENT => Some(vec![SID_TESTER_PRESENT + POSITIVE_OFFSET]),
        SID_READ_DATA_BY_ID if args.len() == 2 => {
            let did = [args[0], args[1]];
            let mut out = vec![SID_READ_DATA_BY_ID + POSITIVE_OFFSET, did[0], did[1]];
            match did {
                DID_VEHICLE_SPEED => out.push(r.speed_kmh),
                DID_ENGINE_SPEED => {
                    let raw = r.rpm.saturating_mul(4);
                    out.extend_from_slice(&raw.to_be_bytes());
                }
                DID_IGNITION => out.push(r.ignition),
                _ => return None,
            }
            Some(out)
        }
        _ => None,
    }
}

fn respond_ds2(data: &[u8], r: &Readings) -> Option<Vec<u8>> {
    match data.first() {
        Some(&DS2_STATUS_BLOCK) => {
            let rpm = r.rpm.to_be_bytes();
            Some(vec![DS2_ACK, r.speed_kmh, rpm[0], rpm[1], r.ignition])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::FastFraming;
    use crate::framer::Framing;

    fn snapshot(moving: bool, variable_values: bool, ignition_ok: bool) -> VehicleSnapshot {
        VehicleSnapshot {
            moving,
            variable_values,
            ignition_ok,
        }
    }

    fn ask(concept: Concept, data: &[u8], vehicle: VehicleSnapshot) -> Option<Vec<u8>> {
        let framing = concept.framing();
        let raw = framing.build(0x12, 0xF1, data);
        let tel = framing.parse(&raw).unwrap();
        Synthesizer::new().respond(concept, &tel, vehicle)
    }

    #[test]
    fn test_tester_present() {
        assert_eq!(
            ask(Concept::Fast, &[0x3E], snapshot(false, false, true)),
            Some(vec![0x7E])
        );
    }

    #[test]
    fn test_ignition_status_follows_flag() {
        let on = ask(Concept::Kwp2000s, &[0x22, 0x40, 0x00], snapshot(false, false, true));
        let off = ask(Concept::Kwp2000s, &[0x22, 0x40, 0x00], snapshot(false, false, false));
        assert_eq!(on, Some(vec![0x62, 0x40, 0x00, IGNITION_ON]));
        assert_eq!(off, Some(vec![0x62, 0x40, 0x00, IGNITION_OFF]));
    }

    #[test]
    fn test_speed_zero_when_parked() {
        let resp = ask(Concept::Fast, &[0x22, 0xF4, 0x0D], snapshot(false, false, true)).unwrap();
        assert_eq!(resp, vec![0x62, 0xF4, 0x0D, 0]);
        let resp = ask(Concept::Fast, &[0x22, 0xF4, 0x0D], snapshot(true, false, true)).unwrap();
        assert_eq!(resp[3], CRUISE_SPEED_KMH as u8);
    }

    #[test]
    fn test_engine_speed_scaled() {
        let resp = ask(Concept::Fast, &[0x22, 0xF4, 0x0C], snapshot(false, false, true)).unwrap();
        let raw = u16::from_be_bytes([resp[3], resp[4]]);
        assert_eq!(raw, (IDLE_RPM * 4) as u16);
        // Moving without ignition is legal and reports a stalled engine
        let resp = ask(Concept::Fast, &[0x22, 0xF4, 0x0C], snapshot(true, false, false)).unwrap();
        assert_eq!(&resp[3..], &[0, 0]);
    }

    #[test]
    fn test_unknown_job_not_synthesized() {
        assert_eq!(ask(Concept::Fast, &[0x22, 0x12, 0x34], snapshot(true, true, true)), None);
        assert_eq!(ask(Concept::Fast, &[0x10, 0x89], snapshot(true, true, true)), None);
        assert_eq!(ask(Concept::Ds2, &[0x04, 0x00], snapshot(true, true, true)), None);
    }

    #[test]
    fn test_ds2_status_block() {
        let resp = ask(Concept::Ds2, &[0x0B], snapshot(true, false, true)).unwrap();
        assert_eq!(resp[0], DS2_ACK);
        assert_eq!(resp[1], CRUISE_SPEED_KMH as u8);
        assert_eq!(u16::from_be_bytes([resp[2], resp[3]]), DRIVING_RPM as u16);
        assert_eq!(resp[4], IGNITION_ON);
    }

    #[test]
    fn test_triangle_bounds() {
        assert_eq!(triangle(Duration::ZERO, 20), -20);
        assert_eq!(triangle(SWEEP_PERIOD / 2, 20), 20);
        for ms in (0..20_000).step_by(137) {
            let v = triangle(Duration::from_millis(ms), 20);
            assert!((-20..=20).contains(&v));
        }
    }

    #[test]
    fn test_variable_values_stay_in_range() {
        let r = Readings::sample(snapshot(true, true, true), Duration::from_millis(1234));
        assert!((30..=70).contains(&(r.speed_kmh as i32)));
        assert!((1800..=2200).contains(&(r.rpm as i32)));
    }

    #[test]
    fn test_reply_wraps_payload() {
        let raw = FastFraming.build(0x12, 0xF1, &[0x3E]);
        let tel = FastFraming.parse(&raw).unwrap();
        let payload = Synthesizer::new()
            .respond(Concept::Fast, &tel, snapshot(false, false, true))
            .unwrap();
        let reply = FastFraming.reply(&tel, &payload);
        assert_eq!(&reply[..4], &[0x81, 0xF1, 0x12, 0x7E]);
    }
}
