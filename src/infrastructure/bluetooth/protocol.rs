//! PAMI Robot GATT Profile
//!
//! UUIDs and frame layouts for the robot's telemetry service, plus the pure
//! decode/encode routines for each frame shape. All multi-byte fields on the
//! wire are little-endian; the layouts here must match the firmware
//! byte-for-byte.

use crate::domain::models::{MotorDebug, MotorOverride, Position};
use crate::infrastructure::bluetooth::LinkError;
use uuid::Uuid;

/// Standard SIG battery service.
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Battery level characteristic, one unsigned byte, notify.
pub const BATTERY_LEVEL_CHAR_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// PAMI custom service.
pub const ROBOT_SERVICE_UUID: Uuid = Uuid::from_u128(0xc10e0000_5a32_42a0_886b_cf9d57a5fd4a);

/// Raw PWM override stream, 13-byte notify. Reserved by the firmware; the
/// monitor does not consume it.
pub const OVERRIDE_PWM_CHAR_UUID: Uuid = Uuid::from_u128(0xc10e0001_5a32_42a0_886b_cf9d57a5fd4a);

/// Odometry frame, 20-byte notify.
pub const POSITION_CHAR_UUID: Uuid = Uuid::from_u128(0xc10e0002_5a32_42a0_886b_cf9d57a5fd4a);

/// Motor control-loop frame, 14-byte notify.
pub const MOTOR_DEBUG_CHAR_UUID: Uuid = Uuid::from_u128(0xc10e0003_5a32_42a0_886b_cf9d57a5fd4a);

/// Motor override command, 5-byte write.
pub const OVERRIDE_MOTOR_CHAR_UUID: Uuid = Uuid::from_u128(0xc10e0004_5a32_42a0_886b_cf9d57a5fd4a);

/// PID debug stream, 26-byte notify. Firmware-side only.
pub const PID_DEBUG_CHAR_UUID: Uuid = Uuid::from_u128(0xc10e0005_5a32_42a0_886b_cf9d57a5fd4a);

/// PID setpoint override, 9-byte write. Firmware-side only.
pub const OVERRIDE_PID_SETPOINT_CHAR_UUID: Uuid =
    Uuid::from_u128(0xc10e0006_5a32_42a0_886b_cf9d57a5fd4a);

/// PID configuration override, 21-byte write. Firmware-side only.
pub const OVERRIDE_PID_CONFIG_CHAR_UUID: Uuid =
    Uuid::from_u128(0xc10e0007_5a32_42a0_886b_cf9d57a5fd4a);

pub const BATTERY_FRAME_LEN: usize = 1;
pub const POSITION_FRAME_LEN: usize = 20;
pub const MOTOR_DEBUG_FRAME_LEN: usize = 14;
pub const MOTOR_OVERRIDE_FRAME_LEN: usize = 5;

fn check_len(expected: usize, data: &[u8]) -> Result<(), LinkError> {
    if data.len() < expected {
        return Err(LinkError::MalformedFrame {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Decode a battery level frame.
///
/// One unsigned byte, 0-100 by firmware convention; forwarded as-is without
/// range validation.
pub fn decode_battery(data: &[u8]) -> Result<u8, LinkError> {
    check_len(BATTERY_FRAME_LEN, data)?;
    Ok(data[0])
}

/// Decode a 20-byte odometry frame.
///
/// ```text
/// [0-3]   : x (f32, mm)
/// [4-7]   : y (f32, mm)
/// [8-11]  : theta (f32, rad)
/// [12-15] : distance speed (f32, mm/s)
/// [16-19] : angle speed (f32, rad/s)
/// ```
pub fn decode_position(data: &[u8]) -> Result<Position, LinkError> {
    check_len(POSITION_FRAME_LEN, data)?;
    Ok(Position {
        x: f32::from_le_bytes([data[0], data[1], data[2], data[3]]),
        y: f32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        theta: f32::from_le_bytes([data[8], data[9], data[10], data[11]]),
        distance_speed: f32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        angle_speed: f32::from_le_bytes([data[16], data[17], data[18], data[19]]),
    })
}

/// Decode a 14-byte motor control-loop frame.
///
/// ```text
/// [0-1]   : timestamp (u16, ms)
/// [2-5]   : left encoder ticks (i32)
/// [6-9]   : right encoder ticks (i32)
/// [10-11] : left PWM (i16)
/// [12-13] : right PWM (i16)
/// ```
pub fn decode_motor_debug(data: &[u8]) -> Result<MotorDebug, LinkError> {
    check_len(MOTOR_DEBUG_FRAME_LEN, data)?;
    Ok(MotorDebug {
        timestamp: u16::from_le_bytes([data[0], data[1]]),
        left_tick: i32::from_le_bytes([data[2], data[3], data[4], data[5]]),
        right_tick: i32::from_le_bytes([data[6], data[7], data[8], data[9]]),
        left_pwm: i16::from_le_bytes([data[10], data[11]]),
        right_pwm: i16::from_le_bytes([data[12], data[13]]),
    })
}

/// Encode a motor override into its 5-byte write payload.
///
/// ```text
/// [0]   : 1 if the override applies after the filter stage, else 0
/// [1-2] : left setpoint (i16)
/// [3-4] : right setpoint (i16)
/// ```
pub fn encode_motor_override(command: &MotorOverride) -> [u8; MOTOR_OVERRIDE_FRAME_LEN] {
    let mut data = [0u8; MOTOR_OVERRIDE_FRAME_LEN];
    data[0] = command.after_filter as u8;
    data[1..3].copy_from_slice(&command.left.to_le_bytes());
    data[3..5].copy_from_slice(&command.right.to_le_bytes());
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_frame(x: f32, y: f32, theta: f32, distance_speed: f32, angle_speed: f32) -> Vec<u8> {
        let mut data = Vec::with_capacity(POSITION_FRAME_LEN);
        for value in [x, y, theta, distance_speed, angle_speed] {
            data.extend_from_slice(&value.to_le_bytes());
        }
        data
    }

    #[test]
    fn battery_frame_decodes_percentage() {
        assert_eq!(decode_battery(&[0x55]).unwrap(), 85);
        assert_eq!(decode_battery(&[0x00]).unwrap(), 0);
    }

    #[test]
    fn empty_battery_frame_is_malformed() {
        assert!(matches!(
            decode_battery(&[]),
            Err(LinkError::MalformedFrame {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn position_frame_decodes_all_five_fields() {
        let data = position_frame(100.0, -50.0, 1.5708, 0.0, 0.0);
        let position = decode_position(&data).unwrap();

        assert_eq!(position.x, 100.0);
        assert_eq!(position.y, -50.0);
        assert_eq!(position.theta, 1.5708);
        assert_eq!(position.distance_speed, 0.0);
        assert_eq!(position.angle_speed, 0.0);
    }

    #[test]
    fn position_round_trips_to_the_same_bytes() {
        let data = position_frame(-1234.5, 987.25, -3.0, 42.0, -0.5);
        let position = decode_position(&data).unwrap();

        let again = position_frame(
            position.x,
            position.y,
            position.theta,
            position.distance_speed,
            position.angle_speed,
        );
        assert_eq!(again, data);
    }

    #[test]
    fn short_position_frame_is_malformed() {
        let data = position_frame(1.0, 2.0, 3.0, 4.0, 5.0);
        assert!(matches!(
            decode_position(&data[..19]),
            Err(LinkError::MalformedFrame {
                expected: 20,
                actual: 19
            })
        ));
    }

    #[test]
    fn motor_debug_fields_are_exact_integers() {
        let mut data = [0u8; MOTOR_DEBUG_FRAME_LEN];
        data[0..2].copy_from_slice(&u16::to_le_bytes(54321));
        data[2..6].copy_from_slice(&i32::to_le_bytes(-1_000_000));
        data[6..10].copy_from_slice(&i32::to_le_bytes(2_000_000));
        data[10..12].copy_from_slice(&i16::to_le_bytes(-512));
        data[12..14].copy_from_slice(&i16::to_le_bytes(512));

        let debug = decode_motor_debug(&data).unwrap();
        assert_eq!(debug.timestamp, 54321);
        assert_eq!(debug.left_tick, -1_000_000);
        assert_eq!(debug.right_tick, 2_000_000);
        assert_eq!(debug.left_pwm, -512);
        assert_eq!(debug.right_pwm, 512);
    }

    #[test]
    fn short_motor_debug_frame_is_malformed() {
        assert!(matches!(
            decode_motor_debug(&[0u8; 13]),
            Err(LinkError::MalformedFrame {
                expected: 14,
                actual: 13
            })
        ));
    }

    #[test]
    fn motor_override_encoding_matches_the_wire() {
        let frame = encode_motor_override(&MotorOverride {
            after_filter: true,
            left: -1000,
            right: 1000,
        });
        assert_eq!(frame, [0x01, 0x18, 0xFC, 0xE8, 0x03]);

        let neutral = encode_motor_override(&MotorOverride {
            after_filter: false,
            left: 0,
            right: 0,
        });
        assert_eq!(neutral, [0x00; 5]);
    }

    #[test]
    fn motor_override_extremes_encode_two_complement() {
        let frame = encode_motor_override(&MotorOverride {
            after_filter: false,
            left: i16::MIN,
            right: i16::MAX,
        });
        assert_eq!(frame, [0x00, 0x00, 0x80, 0xFF, 0x7F]);
    }
}
