//! Robot Link Service
//!
//! The coordinator consumers hold: owns the connection state machine, routes
//! decoded telemetry onto the event bus, and carries operator motor
//! overrides down to the robot.

use crate::bus::{EventBus, ListenerId};
use crate::domain::models::{ConnectionState, MotorOverride, RobotEvent};
use crate::infrastructure::bluetooth::connection::{ConnectionResult, Connector, LinkConfig};
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{
    GattDevice, GattTransport, Notification, RemoteCharacteristic, TransportError,
};
use crate::infrastructure::bluetooth::LinkError;
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The live session behind a connected link.
///
/// Valid exactly while the state is `Connected`; torn down as one unit.
struct DeviceSession {
    device: Box<dyn GattDevice>,
    battery_char: RemoteCharacteristic,
    position_char: RemoteCharacteristic,
    motor_debug_char: RemoteCharacteristic,
    /// Resolved on the first override write, cached for the session.
    override_char: Option<RemoteCharacteristic>,
    pump: JoinHandle<()>,
}

/// Which characteristic feeds which decoder in the notification pump.
#[derive(Clone, Copy)]
struct FrameRoutes {
    battery: Uuid,
    position: Uuid,
    motor_debug: Uuid,
}

/// BLE link to one PAMI robot.
///
/// Construct one per process and hand it to whatever consumes it; there is
/// no global instance. Consumers subscribe through [`RobotLink::on`] and
/// drive the lifecycle with [`RobotLink::connect`] /
/// [`RobotLink::disconnect`].
pub struct RobotLink {
    transport: Box<dyn GattTransport>,
    config: LinkConfig,
    bus: Arc<Mutex<EventBus<RobotEvent>>>,
    state: ConnectionState,
    session: Option<DeviceSession>,
}

impl RobotLink {
    pub fn new(transport: Box<dyn GattTransport>, config: LinkConfig) -> Self {
        Self {
            transport,
            config,
            bus: Arc::new(Mutex::new(EventBus::new())),
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    /// Subscribe to one of the [`crate::domain::models::event`] names.
    ///
    /// Listeners run synchronously on the notification pump; keep them cheap
    /// and never call back into the link from inside one.
    pub fn on(&self, event: &str, listener: impl Fn(&RobotEvent) + Send + 'static) -> ListenerId {
        self.bus().register(event, listener)
    }

    /// Drop a subscription made with [`RobotLink::on`].
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.bus().unregister(event, id)
    }

    fn emit(&self, event: &RobotEvent) {
        self.bus().publish(event.name(), event);
    }

    // A panicking listener must not wedge the link, so poisoning is shed
    // rather than propagated.
    fn bus(&self) -> MutexGuard<'_, EventBus<RobotEvent>> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the connection handshake and start routing telemetry.
    ///
    /// Fails fast with [`LinkError::ConnectInProgress`] unless the link is
    /// fully disconnected; a failed handshake leaves it that way.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        if self.state != ConnectionState::Disconnected {
            return Err(LinkError::ConnectInProgress);
        }
        self.state = ConnectionState::Connecting;
        info!("connecting to robot");

        let connector = Connector::new(&*self.transport, &self.config);
        let result = match connector.establish().await {
            Ok(result) => result,
            Err(error) => {
                self.state = ConnectionState::Disconnected;
                return Err(error);
            }
        };

        // Wire the pump before reporting Connected so no frame can slip
        // between the two.
        let pump = match self.spawn_pump(&result).await {
            Ok(pump) => pump,
            Err(error) => {
                Self::release(&result).await;
                self.state = ConnectionState::Disconnected;
                return Err(LinkError::Transport(error));
            }
        };

        self.session = Some(DeviceSession {
            device: result.device,
            battery_char: result.battery_char,
            position_char: result.position_char,
            motor_debug_char: result.motor_debug_char,
            override_char: None,
            pump,
        });
        self.state = ConnectionState::Connected;
        info!("robot link established");
        self.emit(&RobotEvent::Connected);
        Ok(())
    }

    async fn spawn_pump(
        &self,
        result: &ConnectionResult,
    ) -> Result<JoinHandle<()>, TransportError> {
        let stream = result.device.notifications().await?;
        let routes = FrameRoutes {
            battery: result.battery_char.uuid,
            position: result.position_char.uuid,
            motor_debug: result.motor_debug_char.uuid,
        };
        let bus = Arc::clone(&self.bus);
        Ok(tokio::spawn(pump_notifications(stream, routes, bus)))
    }

    /// Undo a handshake whose session could not be started.
    async fn release(result: &ConnectionResult) {
        for characteristic in [
            &result.motor_debug_char,
            &result.position_char,
            &result.battery_char,
        ] {
            if let Err(error) = result.device.unsubscribe(characteristic).await {
                warn!(
                    "could not stop notifications on {}: {error}",
                    characteristic.uuid
                );
            }
        }
        if result.device.is_connected().await {
            let _ = result.device.disconnect().await;
        }
    }

    /// Tear the link down.
    ///
    /// Idempotent: safe on a never-connected or already-disconnected link.
    /// Always finishes in `Disconnected` and publishes `disconnected`, even
    /// when parts of the teardown fail.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.pump.abort();
            for characteristic in [
                &session.battery_char,
                &session.position_char,
                &session.motor_debug_char,
            ] {
                if let Err(error) = session.device.unsubscribe(characteristic).await {
                    warn!(
                        "could not stop notifications on {}: {error}",
                        characteristic.uuid
                    );
                }
            }
            if session.device.is_connected().await {
                if let Err(error) = session.device.disconnect().await {
                    warn!("gatt disconnect failed: {error}");
                }
            }
            info!("robot link closed");
        }
        self.state = ConnectionState::Disconnected;
        self.emit(&RobotEvent::Disconnected);
    }

    /// True while the link is fully connected. Pure state read.
    pub fn is_device_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Write a motor override to the robot.
    ///
    /// The override characteristic is resolved lazily on first use and kept
    /// for the rest of the session. Write failures surface unchanged as
    /// [`LinkError::WriteFailed`].
    pub async fn send_motor_override(
        &mut self,
        after_filter: bool,
        left: i16,
        right: i16,
    ) -> Result<(), LinkError> {
        if self.state != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }
        let session = self.session.as_mut().ok_or(LinkError::NotConnected)?;

        let characteristic = match session.override_char {
            Some(characteristic) => characteristic,
            None => {
                let characteristic = session
                    .device
                    .characteristics()
                    .into_iter()
                    .find(|c| {
                        c.service == self.config.robot_service_uuid
                            && c.uuid == self.config.override_motor_char_uuid
                    })
                    .ok_or(LinkError::CharacteristicResolutionFailed(
                        self.config.override_motor_char_uuid,
                    ))?;
                session.override_char = Some(characteristic);
                characteristic
            }
        };

        let frame = protocol::encode_motor_override(&MotorOverride {
            after_filter,
            left,
            right,
        });
        session
            .device
            .write(&characteristic, &frame)
            .await
            .map_err(LinkError::WriteFailed)?;
        debug!(left, right, after_filter, "motor override written");
        Ok(())
    }
}

/// Decode frames off the notification stream and publish them on the bus.
///
/// Runs on the transport's delivery path: pure arithmetic plus the bus
/// dispatch, nothing suspending. Frames from characteristics the link never
/// subscribed are ignored; undersized frames are logged and dropped.
async fn pump_notifications(
    mut stream: BoxStream<'static, Notification>,
    routes: FrameRoutes,
    bus: Arc<Mutex<EventBus<RobotEvent>>>,
) {
    while let Some(notification) = stream.next().await {
        let decoded = if notification.characteristic == routes.battery {
            protocol::decode_battery(&notification.value).map(RobotEvent::Battery)
        } else if notification.characteristic == routes.position {
            protocol::decode_position(&notification.value).map(RobotEvent::Position)
        } else if notification.characteristic == routes.motor_debug {
            protocol::decode_motor_debug(&notification.value).map(RobotEvent::MotorDebug)
        } else {
            continue;
        };

        match decoded {
            Ok(event) => {
                bus.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .publish(event.name(), &event);
            }
            Err(error) => warn!(
                "dropping frame from {}: {error}",
                notification.characteristic
            ),
        }
    }
    debug!("notification stream closed");
}
