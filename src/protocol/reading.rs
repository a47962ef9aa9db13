//! Sensor readings
//!
//! Maps frames onto typed readings. Frames with an unexpected payload length
//! decode to `Malformed`; unknown control/command pairs to `Unknown`. Neither
//! is an error, since the sensor emits frame types the engine does not use.

use super::frame::*;
use serde::{Deserialize, Serialize};

/// Coarse motion state reported by the presence channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Still,
    Active,
    Other(u8),
}

impl From<u8> for MotionState {
    fn from(code: u8) -> Self {
        match code {
            0x01 => MotionState::Still,
            0x02 => MotionState::Active,
            other => MotionState::Other(other),
        }
    }
}

/// Sleep state as judged by the sensor's own firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipSleepState {
    Deep,
    Light,
    Awake,
    OutOfBed,
    Other(u8),
}

impl From<u8> for ChipSleepState {
    fn from(code: u8) -> Self {
        match code {
            0x00 => ChipSleepState::Deep,
            0x01 => ChipSleepState::Light,
            0x02 => ChipSleepState::Awake,
            0x03 => ChipSleepState::OutOfBed,
            other => ChipSleepState::Other(other),
        }
    }
}

/// Ten-minute status summary computed on the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipSleepSummary {
    pub present: bool,
    pub state: ChipSleepState,
    pub average_resp_rate: u8,
    pub average_heart_rate: u8,
    pub turnovers: u8,
    pub large_motion_pct: u8,
    pub small_motion_pct: u8,
    pub apnea_events: u8,
}

/// Whole-night quality report computed on the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipNightReport {
    pub score: u8,
    pub total_sleep_minutes: u16,
    pub awake_pct: u8,
    pub light_pct: u8,
    pub deep_pct: u8,
    pub out_of_bed_minutes: u8,
    pub out_of_bed_count: u8,
    pub turnovers: u8,
    pub average_resp_rate: u8,
    pub average_heart_rate: u8,
    pub apnea_events: u8,
}

/// Decoded content of one frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorReading {
    HeartRate { bpm: u8 },
    HeartRateSwitchAck,
    Respiration { bpm: u8 },
    BodyMovement { level: u8 },
    Motion { state: MotionState },
    /// Distance to the subject in centimetres
    Distance { cm: u16 },
    /// Subject position in centimetres relative to the sensor
    Orientation { x: i32, y: i32, z: i32 },
    Heartbeat,
    RangeStatus { in_range: Option<bool> },
    SleepSummary(ChipSleepSummary),
    NightReport(ChipNightReport),
    Malformed { control: u8, command: u8, len: usize },
    Unknown { control: u8, command: u8 },
}

/// Sign-magnitude 16-bit value: top bit is the sign, low 15 bits the value
fn sign_magnitude(hi: u8, lo: u8) -> i32 {
    let magnitude = i32::from(u16::from_be_bytes([hi & 0x7F, lo]));
    if hi & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

impl SensorReading {
    pub fn decode(frame: &Frame) -> Self {
        let p = frame.payload.as_slice();
        let malformed = || SensorReading::Malformed {
            control: frame.control,
            command: frame.command,
            len: p.len(),
        };

        match (frame.control, frame.command) {
            (CTRL_HEART_RATE, CMD_HEART_RATE_REPORT) => match p {
                [bpm] => SensorReading::HeartRate { bpm: *bpm },
                _ => malformed(),
            },
            (CTRL_HEART_RATE, CMD_HEART_RATE_SWITCH) => SensorReading::HeartRateSwitchAck,
            (CTRL_BREATH, CMD_BREATH_VALUE) => match p {
                [bpm] => SensorReading::Respiration { bpm: *bpm },
                _ => malformed(),
            },
            (CTRL_HUMAN_PRESENCE, CMD_MOTION_INFO) => match p {
                [code] => SensorReading::Motion {
                    state: MotionState::from(*code),
                },
                _ => malformed(),
            },
            (CTRL_HUMAN_PRESENCE, CMD_BODY_MOVEMENT) => match p {
                [level] => SensorReading::BodyMovement { level: *level },
                _ => malformed(),
            },
            (CTRL_HUMAN_PRESENCE, CMD_HUMAN_DISTANCE) => match p {
                [hi, lo] => SensorReading::Distance {
                    cm: u16::from_be_bytes([*hi, *lo]),
                },
                _ => malformed(),
            },
            (CTRL_HUMAN_PRESENCE, CMD_HUMAN_ORIENTATION) => match p {
                [xh, xl, yh, yl, zh, zl] => SensorReading::Orientation {
                    x: sign_magnitude(*xh, *xl),
                    y: sign_magnitude(*yh, *yl),
                    z: sign_magnitude(*zh, *zl),
                },
                _ => malformed(),
            },
            (CTRL_SYSTEM, CMD_HEARTBEAT) => SensorReading::Heartbeat,
            (CTRL_RANGE, CMD_RANGE_STATUS) => match p {
                [0x00] => SensorReading::RangeStatus {
                    in_range: Some(false),
                },
                [0x01] => SensorReading::RangeStatus {
                    in_range: Some(true),
                },
                [_] => SensorReading::RangeStatus { in_range: None },
                _ => malformed(),
            },
            (CTRL_SLEEP, CMD_SLEEP_COMPREHENSIVE) => match p {
                [present, state, rr, hr, turns, large, small, apnea] => {
                    SensorReading::SleepSummary(ChipSleepSummary {
                        present: *present == 0x01,
                        state: ChipSleepState::from(*state),
                        average_resp_rate: *rr,
                        average_heart_rate: *hr,
                        turnovers: *turns,
                        large_motion_pct: *large,
                        small_motion_pct: *small,
                        apnea_events: *apnea,
                    })
                }
                _ => malformed(),
            },
            (CTRL_SLEEP, CMD_SLEEP_QUALITY) => match p {
                [score, th, tl, awake, light, deep, oob_min, oob_count, turns, rr, hr, apnea] => {
                    SensorReading::NightReport(ChipNightReport {
                        score: *score,
                        total_sleep_minutes: u16::from_be_bytes([*th, *tl]),
                        awake_pct: *awake,
                        light_pct: *light,
                        deep_pct: *deep,
                        out_of_bed_minutes: *oob_min,
                        out_of_bed_count: *oob_count,
                        turnovers: *turns,
                        average_resp_rate: *rr,
                        average_heart_rate: *hr,
                        apnea_events: *apnea,
                    })
                }
                _ => malformed(),
            },
            (control, command) => SensorReading::Unknown { control, command },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(control: u8, command: u8, payload: &[u8]) -> SensorReading {
        SensorReading::decode(&Frame::new(control, command, payload))
    }

    #[test]
    fn test_vital_readings() {
        assert_eq!(
            decode(CTRL_HEART_RATE, CMD_HEART_RATE_REPORT, &[66]),
            SensorReading::HeartRate { bpm: 66 }
        );
        assert_eq!(
            decode(CTRL_BREATH, CMD_BREATH_VALUE, &[15]),
            SensorReading::Respiration { bpm: 15 }
        );
        assert_eq!(
            decode(CTRL_HUMAN_PRESENCE, CMD_BODY_MOVEMENT, &[37]),
            SensorReading::BodyMovement { level: 37 }
        );
    }

    #[test]
    fn test_presence_readings() {
        assert_eq!(
            decode(CTRL_HUMAN_PRESENCE, CMD_MOTION_INFO, &[0x02]),
            SensorReading::Motion {
                state: MotionState::Active
            }
        );
        assert_eq!(
            decode(CTRL_HUMAN_PRESENCE, CMD_HUMAN_DISTANCE, &[0x01, 0x2C]),
            SensorReading::Distance { cm: 300 }
        );
        // 0x8064 is -100 in sign-magnitude, not two's complement
        assert_eq!(
            decode(
                CTRL_HUMAN_PRESENCE,
                CMD_HUMAN_ORIENTATION,
                &[0x80, 0x64, 0x00, 0x32, 0x80, 0x00]
            ),
            SensorReading::Orientation { x: -100, y: 50, z: 0 }
        );
    }

    #[test]
    fn test_chip_reports() {
        let summary = decode(
            CTRL_SLEEP,
            CMD_SLEEP_COMPREHENSIVE,
            &[0x01, 0x01, 14, 58, 3, 5, 12, 0],
        );
        match summary {
            SensorReading::SleepSummary(s) => {
                assert!(s.present);
                assert_eq!(s.state, ChipSleepState::Light);
                assert_eq!(s.average_heart_rate, 58);
                assert_eq!(s.small_motion_pct, 12);
            }
            other => panic!("unexpected reading {other:?}"),
        }

        let night = decode(
            CTRL_SLEEP,
            CMD_SLEEP_QUALITY,
            &[82, 0x01, 0xC2, 10, 55, 35, 4, 1, 17, 14, 59, 2],
        );
        match night {
            SensorReading::NightReport(r) => {
                assert_eq!(r.score, 82);
                assert_eq!(r.total_sleep_minutes, 450);
                assert_eq!(r.deep_pct, 35);
                assert_eq!(r.apnea_events, 2);
            }
            other => panic!("unexpected reading {other:?}"),
        }
    }

    #[test]
    fn test_status_frames() {
        assert_eq!(decode(CTRL_SYSTEM, CMD_HEARTBEAT, &[]), SensorReading::Heartbeat);
        assert_eq!(
            decode(CTRL_RANGE, CMD_RANGE_STATUS, &[0x00]),
            SensorReading::RangeStatus {
                in_range: Some(false)
            }
        );
        assert_eq!(
            decode(CTRL_RANGE, CMD_RANGE_STATUS, &[0x09]),
            SensorReading::RangeStatus { in_range: None }
        );
    }

    #[test]
    fn test_malformed_and_unknown() {
        assert_eq!(
            decode(CTRL_HEART_RATE, CMD_HEART_RATE_REPORT, &[60, 61]),
            SensorReading::Malformed {
                control: CTRL_HEART_RATE,
                command: CMD_HEART_RATE_REPORT,
                len: 2
            }
        );
        assert_eq!(
            decode(0x90, 0x01, &[1]),
            SensorReading::Unknown {
                control: 0x90,
                command: 0x01
            }
        );
    }

    #[test]
    fn test_reading_json_shape() {
        let value = serde_json::to_value(SensorReading::HeartRate { bpm: 61 }).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "heart_rate", "bpm": 61}));
    }
}
