//! Engine configuration

use bdpp_core::{ARMED_RX_PACKETS, MAX_APP_PACKETS, MAX_DRIVER_PACKETS, MAX_RX_PACKETS};

pub use bdpp_driver::config::{DataBits, FlowControl, LinkConfig, Parity, StopBits};

/// Reaction to a completed receive when no free buffer is left to re-arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxOverrunPolicy {
    /// Delivers the packet and leaves the armed set short until a consumer releases a buffer.
    /// Hardware flow control holds the sender meanwhile.
    #[default]
    Stall,
    /// Drops the packet just received and re-arms its buffer, so reception never stops
    DropNewest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    /// Number of small driver-owned packets
    pub driver_packets: usize,
    /// Number of large app-owned packets, constructed on first acquisition
    pub app_packets: usize,
    /// Number of receive packets, armed ones included
    pub rx_packets: usize,
    /// Number of receive packets kept posted with the transfer engine
    pub armed_rx_packets: usize,
    pub rx_overrun_policy: RxOverrunPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver_packets: MAX_DRIVER_PACKETS,
            app_packets: MAX_APP_PACKETS,
            rx_packets: MAX_RX_PACKETS,
            armed_rx_packets: ARMED_RX_PACKETS,
            rx_overrun_policy: RxOverrunPolicy::Stall,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Zero, above the protocol limit or above the storage capacity
    DriverPacketCount,
    /// Zero, above the protocol limit or above the storage capacity
    AppPacketCount,
    /// Zero, above the protocol limit or above the storage capacity
    RxPacketCount,
    /// Zero or above the receive packet count
    ArmedPacketCount,
}

impl Config {
    pub(crate) fn validate(
        &self,
        driver_capacity: usize,
        app_capacity: usize,
        rx_capacity: usize,
    ) -> Result<(), ConfigError> {
        let in_range = |count: usize, limit: usize, capacity: usize| {
            count != 0 && count <= limit && count <= capacity
        };

        if !in_range(self.driver_packets, MAX_DRIVER_PACKETS, driver_capacity) {
            return Err(ConfigError::DriverPacketCount);
        }
        if !in_range(self.app_packets, MAX_APP_PACKETS, app_capacity) {
            return Err(ConfigError::AppPacketCount);
        }
        if !in_range(self.rx_packets, MAX_RX_PACKETS, rx_capacity) {
            return Err(ConfigError::RxPacketCount);
        }
        if self.armed_rx_packets == 0 || self.armed_rx_packets > self.rx_packets {
            return Err(ConfigError::ArmedPacketCount);
        }
        Ok(())
    }
}
