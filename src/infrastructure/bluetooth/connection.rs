//! Connection Handshake
//!
//! Runs the fixed sequence that takes the link from an unpicked device to a
//! fully subscribed telemetry session: discovery, GATT connect, service and
//! characteristic resolution, notification enablement. Any step failing
//! releases everything acquired earlier in the same attempt before the
//! originating error is reported.

use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol;
use crate::infrastructure::bluetooth::transport::{
    DeviceFilter, GattDevice, GattTransport, RemoteCharacteristic,
};
use crate::infrastructure::bluetooth::LinkError;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runtime knobs for the handshake.
///
/// Defaults carry the stock robot profile; the UUIDs only need overriding
/// for bench firmware builds that re-key the service.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub battery_service_uuid: Uuid,
    pub battery_level_char_uuid: Uuid,
    pub robot_service_uuid: Uuid,
    pub position_char_uuid: Uuid,
    pub motor_debug_char_uuid: Uuid,
    pub override_motor_char_uuid: Uuid,
    /// How long discovery may scan before it counts as abandoned.
    pub scan_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            battery_service_uuid: protocol::BATTERY_SERVICE_UUID,
            battery_level_char_uuid: protocol::BATTERY_LEVEL_CHAR_UUID,
            robot_service_uuid: protocol::ROBOT_SERVICE_UUID,
            position_char_uuid: protocol::POSITION_CHAR_UUID,
            motor_debug_char_uuid: protocol::MOTOR_DEBUG_CHAR_UUID,
            override_motor_char_uuid: protocol::OVERRIDE_MOTOR_CHAR_UUID,
            scan_timeout: Duration::from_secs(5),
        }
    }
}

impl LinkConfig {
    /// Build a config from persisted settings.
    ///
    /// The battery service keeps its SIG-assigned UUIDs; only the custom
    /// robot service can be re-keyed.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            robot_service_uuid: Uuid::parse_str(&settings.robot_service_uuid)?,
            position_char_uuid: Uuid::parse_str(&settings.position_char_uuid)?,
            motor_debug_char_uuid: Uuid::parse_str(&settings.motor_debug_char_uuid)?,
            override_motor_char_uuid: Uuid::parse_str(&settings.override_motor_char_uuid)?,
            scan_timeout: Duration::from_secs(settings.scan_timeout_secs),
            ..Self::default()
        })
    }
}

/// Everything a successful handshake hands to the service coordinator.
pub struct ConnectionResult {
    pub device: Box<dyn GattDevice>,
    pub battery_char: RemoteCharacteristic,
    pub position_char: RemoteCharacteristic,
    pub motor_debug_char: RemoteCharacteristic,
}

/// One connection attempt against a transport.
pub struct Connector<'a> {
    transport: &'a dyn GattTransport,
    config: &'a LinkConfig,
}

impl<'a> Connector<'a> {
    pub fn new(transport: &'a dyn GattTransport, config: &'a LinkConfig) -> Self {
        Self { transport, config }
    }

    /// Run the full handshake.
    pub async fn establish(&self) -> Result<ConnectionResult, LinkError> {
        // Step 1: pick a device granting access to both services
        let filter = DeviceFilter {
            advertised_service: self.config.robot_service_uuid,
            optional_services: vec![
                self.config.battery_service_uuid,
                self.config.robot_service_uuid,
            ],
        };
        let device = self
            .transport
            .request_device(&filter)
            .await?
            .ok_or(LinkError::PairingCancelled)?;

        // Step 2: open the GATT server connection
        device
            .connect()
            .await
            .map_err(LinkError::GattConnectionFailed)?;
        debug!("gatt server connected");

        // Steps 3-5 acquire resources; on failure, roll back what this
        // attempt already took before reporting the step that failed.
        let mut subscribed: Vec<RemoteCharacteristic> = Vec::new();
        match self.resolve_and_subscribe(&*device, &mut subscribed).await {
            Ok((battery_char, position_char, motor_debug_char)) => {
                info!("telemetry session established");
                Ok(ConnectionResult {
                    device,
                    battery_char,
                    position_char,
                    motor_debug_char,
                })
            }
            Err(error) => {
                Self::rollback(&*device, &subscribed).await;
                Err(error)
            }
        }
    }

    async fn resolve_and_subscribe(
        &self,
        device: &dyn GattDevice,
        subscribed: &mut Vec<RemoteCharacteristic>,
    ) -> Result<
        (
            RemoteCharacteristic,
            RemoteCharacteristic,
            RemoteCharacteristic,
        ),
        LinkError,
    > {
        // Step 3: both services must be present
        device.discover_services().await?;
        let services = device.services();
        for required in [
            self.config.battery_service_uuid,
            self.config.robot_service_uuid,
        ] {
            if !services.contains(&required) {
                return Err(LinkError::ServiceResolutionFailed(required));
            }
        }
        debug!("battery and robot services resolved");

        // Step 4: the three telemetry characteristics
        let battery_char = Self::find_characteristic(
            device,
            self.config.battery_service_uuid,
            self.config.battery_level_char_uuid,
        )?;
        let position_char = Self::find_characteristic(
            device,
            self.config.robot_service_uuid,
            self.config.position_char_uuid,
        )?;
        let motor_debug_char = Self::find_characteristic(
            device,
            self.config.robot_service_uuid,
            self.config.motor_debug_char_uuid,
        )?;

        // Step 5: enable notifications on each
        for characteristic in [&battery_char, &position_char, &motor_debug_char] {
            device.subscribe(characteristic).await.map_err(|source| {
                LinkError::NotificationEnableFailed {
                    characteristic: characteristic.uuid,
                    source,
                }
            })?;
            subscribed.push(*characteristic);
        }
        debug!("notifications enabled on {} characteristics", subscribed.len());

        Ok((battery_char, position_char, motor_debug_char))
    }

    fn find_characteristic(
        device: &dyn GattDevice,
        service: Uuid,
        uuid: Uuid,
    ) -> Result<RemoteCharacteristic, LinkError> {
        device
            .characteristics()
            .into_iter()
            .find(|c| c.service == service && c.uuid == uuid)
            .ok_or(LinkError::CharacteristicResolutionFailed(uuid))
    }

    /// Release a partially acquired session: stop whatever notifications
    /// this attempt enabled, then drop the GATT link if it is still up.
    /// Failures here are logged and swallowed so the originating handshake
    /// error stays visible.
    async fn rollback(device: &dyn GattDevice, subscribed: &[RemoteCharacteristic]) {
        for characteristic in subscribed.iter().rev() {
            if let Err(error) = device.unsubscribe(characteristic).await {
                warn!(
                    "rollback: could not stop notifications on {}: {error}",
                    characteristic.uuid
                );
            }
        }
        if device.is_connected().await {
            if let Err(error) = device.disconnect().await {
                warn!("rollback: gatt disconnect failed: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::transport::mock::{
        full_profile, MockDevice, MockTransport,
    };

    #[test]
    fn default_settings_map_to_the_stock_profile() {
        let config = LinkConfig::from_settings(&Settings::default()).unwrap();

        assert_eq!(config.robot_service_uuid, protocol::ROBOT_SERVICE_UUID);
        assert_eq!(config.position_char_uuid, protocol::POSITION_CHAR_UUID);
        assert_eq!(config.motor_debug_char_uuid, protocol::MOTOR_DEBUG_CHAR_UUID);
        assert_eq!(
            config.override_motor_char_uuid,
            protocol::OVERRIDE_MOTOR_CHAR_UUID
        );
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
    }

    #[test]
    fn invalid_uuid_override_is_reported() {
        let settings = Settings {
            robot_service_uuid: "not-a-uuid".to_string(),
            ..Settings::default()
        };
        assert!(LinkConfig::from_settings(&settings).is_err());
    }

    #[tokio::test]
    async fn cancelled_discovery_maps_to_pairing_cancelled() {
        let transport = MockTransport::empty();
        let config = LinkConfig::default();
        let result = Connector::new(&transport, &config).establish().await;

        assert!(matches!(result, Err(LinkError::PairingCancelled)));
    }

    #[tokio::test]
    async fn refused_gatt_connection_maps_to_gatt_connection_failed() {
        let transport = MockTransport::with_device(MockDevice::refusing_gatt());
        let config = LinkConfig::default();
        let result = Connector::new(&transport, &config).establish().await;

        assert!(matches!(result, Err(LinkError::GattConnectionFailed(_))));
    }

    #[tokio::test]
    async fn missing_service_fails_resolution_and_disconnects() {
        let characteristics = full_profile()
            .into_iter()
            .filter(|c| c.service != protocol::BATTERY_SERVICE_UUID)
            .collect();
        let device = MockDevice::new(characteristics);
        let transport = MockTransport::with_device(device.clone());
        let config = LinkConfig::default();

        let result = Connector::new(&transport, &config).establish().await;

        assert!(matches!(
            result,
            Err(LinkError::ServiceResolutionFailed(uuid))
                if uuid == protocol::BATTERY_SERVICE_UUID
        ));
        assert!(!device.gatt_connected());
    }

    #[tokio::test]
    async fn missing_characteristic_fails_resolution() {
        let characteristics = full_profile()
            .into_iter()
            .filter(|c| c.uuid != protocol::MOTOR_DEBUG_CHAR_UUID)
            .collect();
        let device = MockDevice::new(characteristics);
        let transport = MockTransport::with_device(device.clone());
        let config = LinkConfig::default();

        let result = Connector::new(&transport, &config).establish().await;

        assert!(matches!(
            result,
            Err(LinkError::CharacteristicResolutionFailed(uuid))
                if uuid == protocol::MOTOR_DEBUG_CHAR_UUID
        ));
        assert!(!device.gatt_connected());
    }

    #[tokio::test]
    async fn failed_subscription_rolls_back_earlier_ones() {
        // Battery and position subscribe first; motor debug then fails.
        let device = MockDevice::failing_subscribe(protocol::MOTOR_DEBUG_CHAR_UUID);
        let transport = MockTransport::with_device(device.clone());
        let config = LinkConfig::default();

        let result = Connector::new(&transport, &config).establish().await;

        assert!(matches!(
            result,
            Err(LinkError::NotificationEnableFailed { characteristic, .. })
                if characteristic == protocol::MOTOR_DEBUG_CHAR_UUID
        ));

        let unsubscribed = device.state().unsubscribed.lock().unwrap().clone();
        assert_eq!(
            unsubscribed,
            vec![
                protocol::POSITION_CHAR_UUID,
                protocol::BATTERY_LEVEL_CHAR_UUID
            ]
        );
        assert!(!device.gatt_connected());
    }

    #[tokio::test]
    async fn successful_handshake_subscribes_all_three() {
        let device = MockDevice::healthy();
        let transport = MockTransport::with_device(device.clone());
        let config = LinkConfig::default();

        let result = Connector::new(&transport, &config)
            .establish()
            .await
            .expect("handshake succeeds");

        assert_eq!(result.battery_char.uuid, protocol::BATTERY_LEVEL_CHAR_UUID);
        assert_eq!(result.position_char.uuid, protocol::POSITION_CHAR_UUID);
        assert_eq!(
            result.motor_debug_char.uuid,
            protocol::MOTOR_DEBUG_CHAR_UUID
        );

        let subscribed = device.state().subscribed.lock().unwrap().clone();
        assert_eq!(
            subscribed,
            vec![
                protocol::BATTERY_LEVEL_CHAR_UUID,
                protocol::POSITION_CHAR_UUID,
                protocol::MOTOR_DEBUG_CHAR_UUID
            ]
        );
        assert!(device.gatt_connected());
    }
}
