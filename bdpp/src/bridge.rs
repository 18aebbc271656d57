//! Completion-context side of the engine

use core::future::poll_fn;
use core::task::{Context, Poll};

use bdpp_core::PacketFlags;
use bdpp_driver::config::LinkConfig;
use bdpp_driver::link::{Link, Rx, Tx};
use bdpp_driver::packet::Packet;
use bdpp_driver::transfer::{Completion, TransferEngine};

use crate::config::{Config, RxOverrunPolicy};

/// Glue between the engine queues and the transfer engine
///
/// Keeps a transmission going while packets are queued and keeps a set of receive buffers
/// posted. Every handler is bounded and allocation-free.
///
/// Drive the bridge from the completion context in one of two ways:
/// * call [`on_interrupt`](Self::on_interrupt) from the transfer interrupt. Wire the waker
///   passed to [`poll_service`](Self::poll_service) to pend the interrupt, so released
///   receive buffers and newly queued packets are picked up as well.
/// * run [`run`](Self::run) as a high-priority task.
pub struct HardwareBridge<'a, E: TransferEngine<'a>> {
    rx: Rx<'a>,
    tx: Tx<'a>,
    transfer: E,
    policy: RxOverrunPolicy,
    armed_target: usize,
    armed: usize,
    tx_in_flight: bool,
    stalled: bool,
}

impl<'a, E: TransferEngine<'a>> HardwareBridge<'a, E> {
    pub(crate) fn attach(
        link: Link<'a>,
        mut transfer: E,
        link_config: &LinkConfig,
        config: &Config,
    ) -> Result<Self, E::Error> {
        transfer.install(link_config)?;

        let capacity = transfer.rx_capacity();
        if capacity < config.armed_rx_packets {
            warn!(
                "Transfer engine holds {} receive buffers, {} requested",
                capacity, config.armed_rx_packets
            );
        }

        let (rx, tx) = link.split();
        let mut bridge = Self {
            rx,
            tx,
            transfer,
            policy: config.rx_overrun_policy,
            armed_target: config.armed_rx_packets.min(capacity),
            armed: 0,
            tx_in_flight: false,
            stalled: false,
        };
        bridge.service();
        Ok(bridge)
    }

    /// Drains every finished transfer, then services the link.
    ///
    /// Returns whether anything happened.
    pub fn on_interrupt(&mut self) -> bool {
        let mut progress = false;
        while let Some(completion) = self.transfer.poll_completion() {
            progress = true;
            match completion {
                Completion::Sent(packet) => self.on_send_complete(packet),
                Completion::Received(packet) => self.on_receive_complete(packet),
            }
        }
        self.service() || progress
    }

    /// Re-arms receive buffers and starts the next transmission.
    ///
    /// Returns whether a buffer was posted or a transmission started.
    pub fn service(&mut self) -> bool {
        let armed = self.keep_armed();
        let sent = self.pump_tx();
        armed || sent
    }

    /// Services the link, registering the waker with every event source first.
    pub fn poll_service(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        self.transfer.register_waker(cx.waker());
        self.tx.register_waker(cx.waker());
        self.rx.register_waker(cx.waker());

        if self.on_interrupt() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    pub async fn run(&mut self) -> ! {
        loop {
            poll_fn(|cx| self.poll_service(cx)).await;
        }
    }

    /// Recycles a sent packet and starts the next transmission.
    pub fn on_send_complete(&mut self, packet: Packet<'a>) {
        self.tx_in_flight = false;
        self.tx.complete(packet);
        self.pump_tx();
    }

    /// Routes a received packet by its stream id and re-arms a replacement buffer.
    pub fn on_receive_complete(&mut self, packet: Packet<'a>) {
        debug_assert!(self.armed > 0);
        self.armed = self.armed.saturating_sub(1);

        let valid = packet.is_flag_set(PacketFlags::DONE);
        if valid && self.policy == RxOverrunPolicy::DropNewest && !self.rx.has_free() {
            let packet = self.rx.discard(packet);
            self.post_receive(packet);
            return;
        }

        self.rx.push(packet);
        self.keep_armed();
    }

    /// Posts free receive buffers up to the armed target.
    ///
    /// Returns whether a buffer was posted.
    pub fn keep_armed(&mut self) -> bool {
        let mut posted = false;
        while self.armed < self.armed_target {
            match self.rx.take_free() {
                Some(packet) => {
                    self.post_receive(packet);
                    posted = true;
                }
                None => {
                    if !self.stalled {
                        self.stalled = true;
                        self.rx.note_stall();
                        warn!(
                            "Receive buffers exhausted, {} of {} armed",
                            self.armed, self.armed_target
                        );
                    }
                    return posted;
                }
            }
        }
        self.stalled = false;
        posted
    }

    /// Hands the next queued packet to the transfer engine unless one is in flight.
    ///
    /// Returns whether a transmission started.
    pub fn pump_tx(&mut self) -> bool {
        if self.tx_in_flight {
            return false;
        }
        match self.tx.pop() {
            Some(packet) => {
                trace!(
                    "Sending packet of stream {}, {} bytes",
                    packet.stream_id().into_u8(),
                    packet.actual_size()
                );
                self.transfer.submit(packet);
                self.tx_in_flight = true;
                true
            }
            None => false,
        }
    }

    /// Number of receive buffers posted with the transfer engine
    pub fn armed(&self) -> usize {
        self.armed
    }

    pub fn armed_target(&self) -> usize {
        self.armed_target
    }

    pub fn is_tx_in_flight(&self) -> bool {
        self.tx_in_flight
    }

    pub fn transfer(&self) -> &E {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut E {
        &mut self.transfer
    }

    fn post_receive(&mut self, packet: Packet<'a>) {
        self.transfer.post_receive(packet);
        self.armed += 1;
    }
}
