use core::task::{Context, Waker};
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Deque;

use bdpp_driver::config::{DataBits, LinkConfig};
use bdpp_driver::packet::Packet;
use bdpp_driver::transfer::{Completion, TransferEngine};

use crate::fmt::Bytes;
use crate::wire::Wire;

/// Number of receive buffers the engine holds posted at once
pub const POSTED_RX_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstallError {
    AlreadyInstalled,
    UnsupportedBaudRate,
    /// Records are byte streams; only 8 data bits carry them
    UnsupportedDataBits,
}

/// Software transfer engine over a pair of wires
///
/// Sends records onto `tx_wire` and receives records from `rx_wire`. Passing the same wire
/// twice loops the link back to itself. Transfers progress when the bridge polls for
/// completions; a full `tx_wire` holds the transmission until the far end drains it.
pub struct LoopbackEngine<'a, 'w, M: RawMutex> {
    tx_wire: &'w Wire<M>,
    rx_wire: &'w Wire<M>,
    link_config: Option<LinkConfig>,
    sending: Option<Packet<'a>>,
    posted: Deque<Packet<'a>, POSTED_RX_CAPACITY>,
}

impl<'a, 'w, M: RawMutex> LoopbackEngine<'a, 'w, M> {
    pub fn new(tx_wire: &'w Wire<M>, rx_wire: &'w Wire<M>) -> Self {
        Self {
            tx_wire,
            rx_wire,
            link_config: None,
            sending: None,
            posted: Deque::new(),
        }
    }

    /// Configuration the engine was installed with
    pub fn link_config(&self) -> Option<&LinkConfig> {
        self.link_config.as_ref()
    }

    /// Number of receive buffers waiting for a record
    pub fn posted(&self) -> usize {
        self.posted.len()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_some()
    }

    fn try_finish_send(&mut self) -> Option<Packet<'a>> {
        let packet = self.sending.take()?;
        match self.tx_wire.try_send(packet.record()) {
            Ok(()) => {
                trace!("Wire out: {:02x}", Bytes(packet.record()));
                Some(packet)
            }
            Err(_) => {
                self.sending = Some(packet);
                None
            }
        }
    }

    fn try_finish_receive(&mut self) -> Option<Packet<'a>> {
        if self.posted.is_empty() {
            return None;
        }
        let record = self.rx_wire.try_receive()?;
        trace!("Wire in: {:02x}", Bytes(&record));

        let mut packet = unwrap!(self.posted.pop_front());
        if let Err(err) = packet.load_record(&record) {
            warn!("Malformed record of {} bytes: {:?}", record.len(), err);
        }
        Some(packet)
    }
}

impl<'a, 'w, M: RawMutex> TransferEngine<'a> for LoopbackEngine<'a, 'w, M> {
    type Error = InstallError;

    fn install(&mut self, config: &LinkConfig) -> Result<(), InstallError> {
        if self.link_config.is_some() {
            return Err(InstallError::AlreadyInstalled);
        }
        if config.baud_rate == 0 {
            return Err(InstallError::UnsupportedBaudRate);
        }
        if config.data_bits != DataBits::Eight {
            return Err(InstallError::UnsupportedDataBits);
        }
        debug!("Loopback installed at {} baud", config.baud_rate);
        self.link_config = Some(config.clone());
        Ok(())
    }

    fn rx_capacity(&self) -> usize {
        POSTED_RX_CAPACITY
    }

    fn submit(&mut self, packet: Packet<'a>) {
        assert!(self.sending.is_none());
        self.sending = Some(packet);
    }

    fn post_receive(&mut self, packet: Packet<'a>) {
        unwrap!(self.posted.push_back(packet).ok());
    }

    fn poll_completion(&mut self) -> Option<Completion<'a>> {
        if let Some(packet) = self.try_finish_send() {
            return Some(Completion::Sent(packet));
        }
        self.try_finish_receive().map(Completion::Received)
    }

    fn register_waker(&mut self, waker: &Waker) {
        let mut cx = Context::from_waker(waker);
        if self.sending.is_some() {
            let _ = self.tx_wire.poll_ready_to_send(&mut cx);
        }
        if !self.posted.is_empty() {
            let _ = self.rx_wire.poll_ready_to_receive(&mut cx);
        }
    }
}
