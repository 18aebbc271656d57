//! Protocol engine facade

use core::cell::Cell;
use core::future::poll_fn;
use core::task::{Context, Poll, Waker};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use bdpp_core::{Ownership, PacketFlags, StreamId, StreamSet};
use bdpp_driver::config::LinkConfig;
use bdpp_driver::internal::{self, DynamicLink, DynamicRx, DynamicTx};
use bdpp_driver::link::Link;
use bdpp_driver::packet::{Packet, PacketClass, PoolId};
use bdpp_driver::transfer::TransferEngine;

use crate::bridge::HardwareBridge;
use crate::config::{Config, ConfigError};
use crate::pool::{self, ClassCounts, PacketPool, ReleaseError};
use crate::recycler::{self, RxRoute};
use crate::rx_demux::RxDemultiplexer;
use crate::storage::Storage;
use crate::tx_queue::{TxError, TxQueue};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError<E> {
    /// The engine already has a hardware bridge
    AlreadyInitialized,
    /// The transfer engine failed to install
    Install(E),
}

/// Link activity counters
///
/// Counters wrap on overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Statistics {
    /// Packets sent and reclaimed
    pub tx_packets: u32,
    /// Packets delivered to stream queues
    pub rx_packets: u32,
    /// Receive buffers reclaimed without a valid record
    pub rx_discarded: u32,
    /// Received packets dropped for lack of a free buffer
    pub rx_dropped: u32,
    /// Times the armed receive set fell short of its target
    pub rx_stalls: u32,
    /// Failed transmit packet acquisitions
    pub tx_exhausted: u32,
}

/// Location of every packet the engine does not currently lend out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Census {
    /// Packets in the free pools, unconstructed app packets included
    pub free: ClassCounts,
    pub tx_queued: usize,
    pub rx_queued: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Uninitialized,
    Installing,
    Initialized,
}

/// BDPP engine
///
/// Owns the packet pools and queues of one serial link. Producers and consumers use the
/// engine directly; the completion context uses the [`HardwareBridge`] returned by
/// [`Engine::initialize`].
///
/// Every structure sits behind its own mutex, held for a single push or pop.
/// Pick `CriticalSectionRawMutex` when the bridge runs in an interrupt, or a thread-mode mutex
/// when all users are tasks of one executor.
pub struct Engine<'a, M: RawMutex> {
    config: Config,
    state: Mutex<M, Cell<LinkState>>,
    stats: Mutex<M, Cell<Statistics>>,
    pool: PacketPool<'a, M>,
    tx_queue: TxQueue<'a, M>,
    rx_demux: RxDemultiplexer<'a, M>,
}

impl<'a, M: RawMutex + Sync> Engine<'a, M> {
    /// Builds the packet pools over the storage.
    pub fn new<const D: usize, const A: usize, const R: usize>(
        storage: &'a mut Storage<D, A, R>,
        config: Config,
    ) -> Result<Self, ConfigError> {
        config.validate(D, A, R)?;

        let id = PoolId(storage as *const Storage<D, A, R> as usize);
        let Storage { driver, app, rx } = storage;
        let pool = PacketPool::new(
            id,
            driver,
            app,
            rx,
            config.driver_packets,
            config.app_packets,
            config.rx_packets,
        );

        Ok(Self {
            config,
            state: Mutex::new(Cell::new(LinkState::Uninitialized)),
            stats: Mutex::new(Cell::new(Statistics::default())),
            pool,
            tx_queue: TxQueue::new(),
            rx_demux: RxDemultiplexer::new(),
        })
    }

    /// Installs the transfer engine and starts receiving.
    ///
    /// Succeeds once per engine. On install failure the engine stays uninitialized and
    /// may be initialized again.
    pub fn initialize<E: TransferEngine<'a>>(
        &'a self,
        transfer: E,
        link_config: &LinkConfig,
    ) -> Result<HardwareBridge<'a, E>, InitError<E::Error>> {
        let claimed = self.state.lock(|state| {
            if state.get() == LinkState::Uninitialized {
                state.set(LinkState::Installing);
                true
            } else {
                false
            }
        });
        if !claimed {
            warn!("Engine is already initialized");
            return Err(InitError::AlreadyInitialized);
        }

        match HardwareBridge::attach(Link::new(self), transfer, link_config, &self.config) {
            Ok(bridge) => {
                self.state.lock(|state| state.set(LinkState::Initialized));
                info!("Link installed at {} baud", link_config.baud_rate);
                Ok(bridge)
            }
            Err(err) => {
                self.state.lock(|state| state.set(LinkState::Uninitialized));
                error!("Transfer engine install failed");
                Err(InitError::Install(err))
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock(|state| state.get()) == LinkState::Initialized
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes a free transmit packet for the stream. Never blocks.
    ///
    /// Returns `None` when the pool of the class is exhausted.
    pub fn acquire_tx_packet(&self, class: Ownership, stream: StreamId) -> Option<Packet<'a>> {
        match self.pool.acquire(class) {
            Some(mut packet) => {
                packet.set_stream_id(stream);
                Some(packet)
            }
            None => {
                trace!("Transmit packet pool exhausted");
                self.update_stats(|stats| {
                    stats.tx_exhausted = stats.tx_exhausted.wrapping_add(1)
                });
                None
            }
        }
    }

    /// Returns a packet of any class to its pool.
    ///
    /// Packets acquired from another engine are handed back in the error.
    pub fn release_packet(&self, packet: Packet<'a>) -> Result<(), ReleaseError<'a>> {
        self.pool.release(packet)
    }

    /// Queues a packet for transmission and marks it ready.
    pub fn queue_tx_packet(&self, packet: Packet<'a>) -> Result<(), TxError<'a>> {
        if packet.origin().pool != self.pool.id() {
            return Err(TxError::Foreign(packet));
        }
        self.tx_queue.enqueue(packet)
    }

    pub fn rx_packet_available(&self, stream: StreamId) -> bool {
        self.rx_demux.available(stream)
    }

    /// Takes the oldest received packet of the stream.
    ///
    /// The caller owns the packet and must release it.
    pub fn get_rx_packet(&self, stream: StreamId) -> Option<Packet<'a>> {
        self.rx_demux.pop(stream)
    }

    pub fn poll_rx_packet(&self, cx: &mut Context<'_>, stream: StreamId) -> Poll<Packet<'a>> {
        self.rx_demux.poll_pop(cx, stream)
    }

    /// Waits for the next received packet of the stream. Safe to drop.
    pub async fn receive(&self, stream: StreamId) -> Packet<'a> {
        poll_fn(|cx| self.poll_rx_packet(cx, stream)).await
    }

    /// Streams with received packets waiting
    pub fn rx_readiness(&self) -> StreamSet {
        self.rx_demux.readiness()
    }

    /// Free packets of the class
    pub fn available(&self, class: PacketClass) -> usize {
        self.pool.available().get(class)
    }

    /// Total packets of the class
    pub fn capacity(&self, class: PacketClass) -> usize {
        self.pool.capacity().get(class)
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.lock(|stats| stats.get())
    }

    /// Counts packets per location.
    ///
    /// Locations are sampled one after another, so the result is exact only while the link
    /// is quiescent.
    pub fn census(&self) -> Census {
        Census {
            free: self.pool.available(),
            tx_queued: self.tx_queue.len(),
            rx_queued: self.rx_demux.len(),
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut Statistics)) {
        self.stats.lock(|cell| {
            let mut stats = cell.get();
            f(&mut stats);
            cell.set(stats);
        })
    }
}

impl<'a, M: RawMutex + Sync> DynamicTx<'a> for Engine<'a, M> {
    fn try_pop(&self) -> Option<Packet<'a>> {
        self.tx_queue.dequeue()
    }

    fn register_tx_waker(&self, waker: &Waker) {
        self.tx_queue.register_waker(waker)
    }

    fn recycle(&self, mut packet: Packet<'a>) {
        recycler::finish_tx(&mut packet);
        self.update_stats(|stats| stats.tx_packets = stats.tx_packets.wrapping_add(1));
        unwrap!(self.pool.release(packet).ok());
    }
}

impl<'a, M: RawMutex + Sync> DynamicRx<'a> for Engine<'a, M> {
    fn try_take_free(&self) -> Option<Packet<'a>> {
        let mut packet = self.pool.acquire_rx()?;
        packet.set_flags(PacketFlags::READY);
        Some(packet)
    }

    fn has_free(&self) -> bool {
        self.pool.has_free_rx()
    }

    fn register_rx_waker(&self, waker: &Waker) {
        self.pool.register_rx_waker(waker)
    }

    fn push(&self, mut packet: Packet<'a>) {
        match recycler::route_rx(&mut packet) {
            RxRoute::Deliver(stream) => {
                self.update_stats(|stats| stats.rx_packets = stats.rx_packets.wrapping_add(1));
                self.rx_demux.push(stream, packet);
            }
            RxRoute::Reclaim => {
                warn!("Invalid record in receive buffer {}", packet.origin().slot);
                self.update_stats(|stats| {
                    stats.rx_discarded = stats.rx_discarded.wrapping_add(1)
                });
                unwrap!(self.pool.release(packet).ok());
            }
        }
    }

    fn discard(&self, mut packet: Packet<'a>) -> Packet<'a> {
        warn!("Dropping packet of stream {}", packet.stream_id().into_u8());
        self.update_stats(|stats| stats.rx_dropped = stats.rx_dropped.wrapping_add(1));
        internal::reset_packet(&mut packet, pool::idle_flags(PacketClass::Rx));
        packet.set_flags(PacketFlags::READY);
        packet
    }

    fn note_stall(&self) {
        self.update_stats(|stats| stats.rx_stalls = stats.rx_stalls.wrapping_add(1));
    }
}

impl<'a, M: RawMutex + Sync> DynamicLink<'a> for Engine<'a, M> {}
