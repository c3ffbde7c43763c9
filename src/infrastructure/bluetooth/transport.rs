//! GATT Transport Seam
//!
//! The link talks to the robot through these traits instead of a concrete
//! BLE stack, so the handshake and the service coordinator can be exercised
//! against a scripted transport in tests. The production backend is
//! [`BtleplugTransport`], built on btleplug's cross-platform central role.

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors surfaced by a GATT backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth backend: {0}")]
    Backend(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

/// A characteristic resolved on the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCharacteristic {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// A value pushed by the device on a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Discovery filter handed to [`GattTransport::request_device`].
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    /// Service the device must advertise to be picked.
    pub advertised_service: Uuid,
    /// Full access list requested from the host, advertised or not.
    pub optional_services: Vec<Uuid>,
}

/// Host-side device discovery: the "choose a device" step.
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Discover and select a device matching `filter`.
    ///
    /// `Ok(None)` means the discovery window closed without a device being
    /// granted - the operator abandoned the picker.
    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<Box<dyn GattDevice>>, TransportError>;
}

/// One picked device and its GATT link.
#[async_trait]
pub trait GattDevice: Send + Sync {
    /// Open the GATT server connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// True while the GATT link is live.
    async fn is_connected(&self) -> bool;

    /// Drop the GATT link.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Walk the device's service table. Must run after [`Self::connect`].
    async fn discover_services(&self) -> Result<(), TransportError>;

    /// Services found by [`Self::discover_services`].
    fn services(&self) -> Vec<Uuid>;

    /// Characteristics found by [`Self::discover_services`], across all
    /// services.
    fn characteristics(&self) -> Vec<RemoteCharacteristic>;

    /// Enable notifications on one characteristic.
    async fn subscribe(&self, characteristic: &RemoteCharacteristic) -> Result<(), TransportError>;

    /// Stop notifications on one characteristic.
    async fn unsubscribe(&self, characteristic: &RemoteCharacteristic)
        -> Result<(), TransportError>;

    /// Write a value to one characteristic.
    async fn write(
        &self,
        characteristic: &RemoteCharacteristic,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Stream of values for every subscribed characteristic. Single consumer.
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, TransportError>;
}

/// btleplug-backed transport using the first Bluetooth adapter on the host.
///
/// The headless stand-in for a device chooser: scan for the advertised
/// service for a bounded window and pick the first match.
pub struct BtleplugTransport {
    adapter: Adapter,
    scan_timeout: Duration,
}

impl BtleplugTransport {
    pub async fn new(scan_timeout: Duration) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Other("no bluetooth adapter found".into()))?;
        Ok(Self {
            adapter,
            scan_timeout,
        })
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn request_device(
        &self,
        filter: &DeviceFilter,
    ) -> Result<Option<Box<dyn GattDevice>>, TransportError> {
        info!(
            "scanning {:?} for service {}",
            self.scan_timeout, filter.advertised_service
        );
        self.adapter
            .start_scan(ScanFilter {
                services: vec![filter.advertised_service],
            })
            .await?;
        tokio::time::sleep(self.scan_timeout).await;

        let peripherals = self.adapter.peripherals().await?;
        self.adapter.stop_scan().await?;

        for peripheral in peripherals {
            let Some(properties) = peripheral.properties().await? else {
                continue;
            };
            if properties.services.contains(&filter.advertised_service) {
                let name = properties
                    .local_name
                    .unwrap_or_else(|| "unknown".to_string());
                info!("picked {} ({})", name, peripheral.address());
                return Ok(Some(Box::new(BtleplugDevice { peripheral })));
            }
        }
        Ok(None)
    }
}

struct BtleplugDevice {
    peripheral: Peripheral,
}

impl BtleplugDevice {
    fn resolve(
        &self,
        characteristic: &RemoteCharacteristic,
    ) -> Result<btleplug::api::Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
            .ok_or_else(|| {
                TransportError::Other(format!(
                    "characteristic {} not present on device",
                    characteristic.uuid
                ))
            })
    }
}

#[async_trait]
impl GattDevice for BtleplugDevice {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(self.peripheral.connect().await?)
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(self.peripheral.disconnect().await?)
    }

    async fn discover_services(&self) -> Result<(), TransportError> {
        Ok(self.peripheral.discover_services().await?)
    }

    fn services(&self) -> Vec<Uuid> {
        self.peripheral
            .services()
            .into_iter()
            .map(|s| s.uuid)
            .collect()
    }

    fn characteristics(&self) -> Vec<RemoteCharacteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .map(|c| RemoteCharacteristic {
                service: c.service_uuid,
                uuid: c.uuid,
            })
            .collect()
    }

    async fn subscribe(&self, characteristic: &RemoteCharacteristic) -> Result<(), TransportError> {
        let resolved = self.resolve(characteristic)?;
        Ok(self.peripheral.subscribe(&resolved).await?)
    }

    async fn unsubscribe(
        &self,
        characteristic: &RemoteCharacteristic,
    ) -> Result<(), TransportError> {
        let resolved = self.resolve(characteristic)?;
        Ok(self.peripheral.unsubscribe(&resolved).await?)
    }

    async fn write(
        &self,
        characteristic: &RemoteCharacteristic,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let resolved = self.resolve(characteristic)?;
        Ok(self
            .peripheral
            .write(&resolved, payload, WriteType::WithResponse)
            .await?)
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>, TransportError> {
        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .map(|n| Notification {
                characteristic: n.uuid,
                value: n.value,
            })
            .boxed())
    }
}
