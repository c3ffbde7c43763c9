//! Bluetooth Module
//!
//! BLE communication with the PAMI robot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       RobotLink                          │
//! │   (service coordinator - public API for consumers)       │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌────────────┐  ┌────────────┐  ┌───────────┐
//! │ Connection │  │  Protocol  │  │ Transport │
//! │            │  │            │  │           │
//! │ - handshake│  │ - UUIDs    │  │ - GATT    │
//! │ - rollback │  │ - decoding │  │   seam    │
//! │            │  │ - encoding │  │ - btleplug│
//! └────────────┘  └────────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - robot GATT profile, telemetry decoding, command encoding
//! - [`transport`] - GATT transport trait seam and the btleplug backend
//! - [`connection`] - the stepwise connection handshake
//! - [`service`] - the [`service::RobotLink`] coordinator

pub mod connection;
pub mod protocol;
pub mod service;
pub mod transport;

pub use service::RobotLink;

use thiserror::Error;
use transport::TransportError;
use uuid::Uuid;

/// Errors surfaced by the robot link.
///
/// Handshake failures propagate unchanged out of `connect()`; the link never
/// retries or reconnects on its own.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Device discovery ended without a device being granted.
    #[error("device selection cancelled")]
    PairingCancelled,

    /// The GATT server connection could not be opened.
    #[error("failed to connect to GATT server")]
    GattConnectionFailed(#[source] TransportError),

    /// A required service is missing from the device's GATT table.
    #[error("service {0} not found on device")]
    ServiceResolutionFailed(Uuid),

    /// A characteristic is missing from its service.
    #[error("characteristic {0} not found")]
    CharacteristicResolutionFailed(Uuid),

    /// Notifications could not be enabled on a telemetry characteristic.
    #[error("could not enable notifications on {characteristic}")]
    NotificationEnableFailed {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },

    /// `connect()` was called while a link was connecting or connected.
    #[error("a connection attempt is already in progress or established")]
    ConnectInProgress,

    /// An operation that needs a live link ran without one.
    #[error("not connected to a robot")]
    NotConnected,

    /// The override characteristic rejected the write.
    #[error("override write rejected")]
    WriteFailed(#[source] TransportError),

    /// A telemetry buffer was shorter than its frame layout.
    #[error("telemetry frame too short: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// Backend fault outside the named handshake steps.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
