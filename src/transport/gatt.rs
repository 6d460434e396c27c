//! Device protocol over a GATT-style characteristic link.
//!
//! The arm controller exposes one characteristic per scalar. Every write is a
//! two-byte little-endian frame `[value, 0x00]`. Usability is read from its own
//! characteristic; firmware revisions answer with either `[flag]` or
//! `[0x00, flag]`, so only the last byte is significant.

use super::{Transport, TransportError};
use crate::control::{Channel, Command};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SERVICE_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0xD4, 0xE6, 0xC6, 0xA1,
]);
pub const AXIS_X_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0x6B, 0xB3, 0x91, 0x05,
]);
pub const AXIS_Y_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0x5D, 0xD1, 0x09, 0xD3,
]);
pub const AXIS_R_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0x4E, 0xC5, 0x2E, 0xF4,
]);
pub const USABILITY_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0xB3, 0xC2, 0xA1, 0xE7,
]);
pub const LIFTING_ARM_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0xE3, 0xD7, 0xA9, 0xA7,
]);
pub const CLAW_SWITCH_UUID: Uuid = Uuid::from_bytes([
    0x00, 0x81, 0x19, 0x14, 0x45, 0x11, 0x19, 0x19, 0x19, 0x19, 0x45, 0x11, 0xC4, 0xD4, 0xD3, 0xE2,
]);

pub const STATUS_USABLE: u8 = 0x01;
pub const STATUS_NOT_USABLE: u8 = 0x00;

/// Two-byte little-endian frame carrying one scalar.
pub fn frame(value: u8) -> [u8; 2] {
    [value, 0x00]
}

/// Interprets a usability read. Anything but a trailing `0x01` means not usable.
pub fn parse_usability(data: &[u8]) -> bool {
    match data.last() {
        Some(&STATUS_USABLE) => true,
        Some(&STATUS_NOT_USABLE) => false,
        Some(other) => {
            warn!("Unknown usability status 0x{:02X}, treating as not usable", other);
            false
        }
        None => {
            debug!("Empty usability status, treating as not usable");
            false
        }
    }
}

/// Characteristic read/write access to a device. Implemented by the BLE stack.
///
/// Characteristics are addressed within their service.
#[async_trait]
pub trait GattLink: Send + Sync {
    async fn open(&self, address: &str) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    async fn write(
        &self,
        service: Uuid,
        characteristic: Uuid,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>, TransportError>;
}

/// Characteristic and value written for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBinding {
    pub characteristic: Uuid,
    pub value: u8,
}

/// Where each control lands on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GattProfile {
    pub service: Uuid,
    pub axis_x: Uuid,
    pub axis_y: Uuid,
    pub axis_r: Uuid,
    pub usability: Uuid,
    pub channels: BTreeMap<Channel, Uuid>,
    pub commands: BTreeMap<Command, CommandBinding>,
}

impl Default for GattProfile {
    fn default() -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(Channel::A, LIFTING_ARM_UUID);

        let mut commands = BTreeMap::new();
        commands.insert(
            Command::Grab,
            CommandBinding {
                characteristic: CLAW_SWITCH_UUID,
                value: 0x01,
            },
        );
        commands.insert(
            Command::Release,
            CommandBinding {
                characteristic: CLAW_SWITCH_UUID,
                value: 0x00,
            },
        );

        Self {
            service: SERVICE_UUID,
            axis_x: AXIS_X_UUID,
            axis_y: AXIS_Y_UUID,
            axis_r: AXIS_R_UUID,
            usability: USABILITY_UUID,
            channels,
            commands,
        }
    }
}

/// [`Transport`] speaking the arm protocol over a [`GattLink`].
pub struct GattTransport<L> {
    link: L,
    profile: GattProfile,
}

impl<L: GattLink> GattTransport<L> {
    pub fn new(link: L, profile: GattProfile) -> Self {
        Self { link, profile }
    }

    pub fn profile(&self) -> &GattProfile {
        &self.profile
    }

    async fn write_scalar(&self, characteristic: Uuid, value: u8) -> Result<(), TransportError> {
        let payload = frame(value);
        self.link
            .write(self.profile.service, characteristic, &payload)
            .await
            .map_err(|e| {
                debug!("Write {:02X?} to {} failed: {}", payload, characteristic, e);
                e
            })
    }
}

#[async_trait]
impl<L: GattLink> Transport for GattTransport<L> {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        info!("Opening GATT link to {}", address);
        self.link.open(address).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        info!("Closing GATT link");
        self.link.close().await
    }

    async fn poll_usability(&self) -> Result<bool, TransportError> {
        let data = self
            .link
            .read(self.profile.service, self.profile.usability)
            .await?;
        debug!("Usability status bytes: {:02X?}", data);
        Ok(parse_usability(&data))
    }

    async fn send_axes(&self, x: u8, y: u8, r: u8) -> Result<(), TransportError> {
        self.write_scalar(self.profile.axis_x, x).await?;
        self.write_scalar(self.profile.axis_y, y).await?;
        self.write_scalar(self.profile.axis_r, r).await
    }

    async fn send_channel_value(&self, channel: Channel, value: u8) -> Result<(), TransportError> {
        let characteristic = self
            .profile
            .channels
            .get(&channel)
            .copied()
            .ok_or_else(|| TransportError::Unsupported(format!("channel {channel} is unbound")))?;
        self.write_scalar(characteristic, value).await
    }

    async fn send_command(&self, command: Command) -> Result<(), TransportError> {
        let binding = self
            .profile
            .commands
            .get(&command)
            .copied()
            .ok_or_else(|| TransportError::Unsupported(format!("command {command} is unbound")))?;
        self.write_scalar(binding.characteristic, binding.value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLink {
        writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
        services: Mutex<Vec<Uuid>>,
        status: Mutex<Vec<u8>>,
        fail_on: Option<Uuid>,
    }

    #[async_trait]
    impl GattLink for FakeLink {
        async fn open(&self, _address: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn write(
            &self,
            service: Uuid,
            characteristic: Uuid,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            self.services.lock().unwrap().push(service);
            if self.fail_on == Some(characteristic) {
                return Err(TransportError::Link("write rejected".into()));
            }
            self.writes
                .lock()
                .unwrap()
                .push((characteristic, payload.to_vec()));
            Ok(())
        }

        async fn read(&self, service: Uuid, _characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
            self.services.lock().unwrap().push(service);
            Ok(self.status.lock().unwrap().clone())
        }
    }

    fn transport(link: FakeLink) -> GattTransport<FakeLink> {
        GattTransport::new(link, GattProfile::default())
    }

    #[test]
    fn usability_uses_last_byte() {
        assert!(parse_usability(&[0x01]));
        assert!(parse_usability(&[0x00, 0x01]));
        assert!(!parse_usability(&[0x01, 0x00]));
        assert!(!parse_usability(&[]));
        assert!(!parse_usability(&[0x7F]));
    }

    #[tokio::test]
    async fn axes_are_written_x_then_y_then_r() {
        let gatt = transport(FakeLink::default());
        gatt.send_axes(255, 127, 3).await.unwrap();

        let writes = gatt.link.writes.lock().unwrap().clone();
        assert_eq!(
            writes,
            vec![
                (AXIS_X_UUID, vec![255, 0x00]),
                (AXIS_Y_UUID, vec![127, 0x00]),
                (AXIS_R_UUID, vec![3, 0x00]),
            ]
        );
    }

    #[tokio::test]
    async fn failed_axis_write_stops_the_triple() {
        let gatt = transport(FakeLink {
            fail_on: Some(AXIS_Y_UUID),
            ..Default::default()
        });
        assert!(gatt.send_axes(1, 2, 3).await.is_err());
        assert_eq!(gatt.link.writes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn poll_reads_the_usability_characteristic() {
        let link = FakeLink::default();
        *link.status.lock().unwrap() = vec![0x00, 0x01];
        let gatt = transport(link);
        assert_eq!(gatt.poll_usability().await, Ok(true));
    }

    #[tokio::test]
    async fn commands_follow_their_bindings() {
        let gatt = transport(FakeLink::default());
        gatt.send_command(Command::Grab).await.unwrap();
        gatt.send_command(Command::Release).await.unwrap();
        assert!(matches!(
            gatt.send_command(Command::Throw).await,
            Err(TransportError::Unsupported(_))
        ));

        let writes = gatt.link.writes.lock().unwrap().clone();
        assert_eq!(
            writes,
            vec![
                (CLAW_SWITCH_UUID, vec![0x01, 0x00]),
                (CLAW_SWITCH_UUID, vec![0x00, 0x00]),
            ]
        );
    }

    #[tokio::test]
    async fn unbound_channel_is_unsupported() {
        let gatt = transport(FakeLink::default());
        gatt.send_channel_value(Channel::A, 200).await.unwrap();
        assert!(matches!(
            gatt.send_channel_value(Channel::End, 5).await,
            Err(TransportError::Unsupported(_))
        ));
        assert_eq!(
            gatt.link.writes.lock().unwrap().as_slice(),
            &[(LIFTING_ARM_UUID, vec![200, 0x00])]
        );
    }

    #[tokio::test]
    async fn every_access_goes_through_the_profile_service() {
        let service = Uuid::from_u128(0x1234);
        let profile = GattProfile {
            service,
            ..GattProfile::default()
        };
        let gatt = GattTransport::new(FakeLink::default(), profile);

        gatt.send_axes(1, 2, 3).await.unwrap();
        gatt.poll_usability().await.unwrap();
        gatt.send_command(Command::Grab).await.unwrap();

        assert_eq!(*gatt.link.services.lock().unwrap(), vec![service; 5]);
    }
}
