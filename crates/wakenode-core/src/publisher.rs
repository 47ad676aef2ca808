//! Formatting readings into property updates.
//!
//! The publisher is stateless apart from the device id: it turns a
//! [`Reading`] or [`BatteryStatus`] into one `publish_property` call per
//! field. Delivery guarantees (queuing, acknowledgement) belong to the
//! transport, so nothing here retries.

use tracing::{debug, warn};

use wakenode_types::properties::{
    BATTERY_CHANNEL, DIAGNOSTICS_CHANNEL, HEAT_INDEX, HUMIDITY, TEMP_C, TEMP_F, VOLTAGE,
    format_value,
};
use wakenode_types::{BatteryStatus, Reading};

use crate::error::Result;
use crate::traits::Transport;

/// Formats readings and forwards them to a [`Transport`].
#[derive(Debug, Clone)]
pub struct ReadingPublisher {
    device_id: String,
}

impl ReadingPublisher {
    /// Create a publisher for `device_id`.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    /// Logical device the properties are published under.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Publish a sensor reading under `channel_id`.
    ///
    /// Sends `tempC`, `tempF`, `humidity` and, when the reading carries one,
    /// `heatIndex`. Every field is attempted even if an earlier one fails;
    /// the first failure is returned. Returns the number of fields sent.
    pub fn publish<T: Transport>(
        &self,
        transport: &mut T,
        channel_id: &str,
        reading: &Reading,
    ) -> Result<usize> {
        let mut fields = vec![
            (TEMP_C, reading.temperature_c),
            (TEMP_F, reading.temperature_f),
            (HUMIDITY, reading.humidity),
        ];
        if let Some(heat_index) = reading.heat_index {
            fields.push((HEAT_INDEX, heat_index));
        }

        let mut sent = 0;
        let mut first_error = None;
        for (key, value) in fields {
            match self.send(transport, channel_id, key, &format_value(value)) {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(channel = channel_id, key, "publish failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Publish the battery voltage under the `battery` channel.
    pub fn publish_battery<T: Transport>(
        &self,
        transport: &mut T,
        status: &BatteryStatus,
    ) -> Result<()> {
        self.send(
            transport,
            BATTERY_CHANNEL,
            VOLTAGE,
            &format_value(status.voltage),
        )
    }

    /// Publish a free-form diagnostic value under the `diagnostics` channel.
    pub fn publish_diagnostic<T: Transport>(
        &self,
        transport: &mut T,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.send(transport, DIAGNOSTICS_CHANNEL, key, value)
    }

    fn send<T: Transport>(
        &self,
        transport: &mut T,
        channel_id: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        debug!(device = %self.device_id, channel = channel_id, key, value, "publish");
        transport.publish_property(&self.device_id, channel_id, key, value)
    }
}
