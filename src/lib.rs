//! BLE telemetry link for the PAMI table robot.
//!
//! Connects a monitoring client to the robot over BLE, decodes its three
//! telemetry streams (battery, odometry, motor debug), republishes them on a
//! named-event bus, and carries operator motor overrides back down the wire.
//!
//! The entry point is [`RobotLink`]: construct one with a transport and a
//! [`LinkConfig`], subscribe with [`RobotLink::on`], then `connect()`.
//! Rendering, charting and any pairing UI live in the consumer; this crate
//! is only the device communication layer.

pub mod bus;
pub mod domain;
pub mod infrastructure;

pub use bus::{EventBus, ListenerId};
pub use domain::models::{
    event, ConnectionState, MotorDebug, MotorOverride, Position, RobotEvent,
};
pub use infrastructure::bluetooth::connection::LinkConfig;
pub use infrastructure::bluetooth::service::RobotLink;
pub use infrastructure::bluetooth::transport::{
    BtleplugTransport, GattDevice, GattTransport, TransportError,
};
pub use infrastructure::bluetooth::LinkError;
