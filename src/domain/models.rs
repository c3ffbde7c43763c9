use serde::{Deserialize, Serialize};

/// Lifecycle of the robot link.
///
/// `Connecting` only exists for the duration of a `connect()` call; any
/// handshake failure falls back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Odometry sample pushed by the robot on the position characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,     // mm
    pub y: f32,     // mm
    pub theta: f32, // rad

    // Speeds along the two control axes
    pub distance_speed: f32, // mm/s
    pub angle_speed: f32,    // rad/s
}

/// Motor control-loop sample pushed on the motor debug characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorDebug {
    // Firmware-side clock, wraps every ~65s
    pub timestamp: u16, // ms

    // Encoder ticks
    pub left_tick: i32,
    pub right_tick: i32,

    // PWM duty currently applied
    pub left_pwm: i16,
    pub right_pwm: i16,
}

/// Operator motor override. Built transiently for encoding, never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorOverride {
    /// Apply the override after the firmware's filter stage rather than
    /// replacing its input.
    pub after_filter: bool,
    pub left: i16,
    pub right: i16,
}

/// Everything the link publishes on its event bus.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    Connected,
    Disconnected,
    Battery(u8),
    Position(Position),
    MotorDebug(MotorDebug),
}

impl RobotEvent {
    /// Bus event name this payload is published under.
    pub fn name(&self) -> &'static str {
        match self {
            RobotEvent::Connected => event::CONNECTED,
            RobotEvent::Disconnected => event::DISCONNECTED,
            RobotEvent::Battery(_) => event::BATTERY,
            RobotEvent::Position(_) => event::POSITION,
            RobotEvent::MotorDebug(_) => event::MOTOR_DEBUG,
        }
    }
}

/// Event names of the consumer-facing contract.
pub mod event {
    /// Link established; no payload.
    pub const CONNECTED: &str = "connected";
    /// Link torn down; no payload. Also emitted by no-op disconnects.
    pub const DISCONNECTED: &str = "disconnected";
    /// Battery percentage, [`super::RobotEvent::Battery`].
    pub const BATTERY: &str = "battery";
    /// Odometry sample, [`super::RobotEvent::Position`].
    pub const POSITION: &str = "position";
    /// Control-loop sample, [`super::RobotEvent::MotorDebug`].
    pub const MOTOR_DEBUG: &str = "motorDebug";
}
