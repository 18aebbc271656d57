use core::cell::RefCell;
use core::task::Waker;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::Vec;

use bdpp_core::{
    MAX_APP_PACKETS, MAX_DRIVER_PACKETS, MAX_RX_PACKETS, Ownership, PacketFlags, PacketId,
};
use bdpp_driver::internal;
use bdpp_driver::packet::{Origin, Packet, PacketClass, PoolId};

use crate::storage::{LargePacketBuffer, SmallPacketBuffer};

/// Fixed collections of free packets
///
/// Packets are constructed over caller-provided storage. Driver and receive packets are
/// constructed at once, app packets on first acquisition. The pool never creates packets
/// beyond the configured counts and never destroys any.
pub struct PacketPool<'a, M: RawMutex> {
    id: PoolId,
    inner: Mutex<M, RefCell<Inner<'a>>>,
}

struct Inner<'a> {
    driver: Vec<Packet<'a>, MAX_DRIVER_PACKETS>,
    app: Vec<Packet<'a>, MAX_APP_PACKETS>,
    app_unconstructed: Vec<(u8, &'a mut [u8]), MAX_APP_PACKETS>,
    rx: Vec<Packet<'a>, MAX_RX_PACKETS>,
    capacity: ClassCounts,
    rx_trigger: WakerRegistration,
}

/// Packet counts per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassCounts {
    pub driver: usize,
    pub app: usize,
    pub rx: usize,
}

/// Packet refused by [`Engine::release_packet`](crate::engine::Engine::release_packet)
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReleaseError<'a> {
    /// The packet belongs to another engine, or its pool is full already.
    /// The packet is handed back unchanged.
    Foreign(Packet<'a>),
}

impl<'a> ReleaseError<'a> {
    /// Recovers the refused packet.
    pub fn into_packet(self) -> Packet<'a> {
        match self {
            ReleaseError::Foreign(packet) => packet,
        }
    }
}

impl ClassCounts {
    pub fn get(&self, class: PacketClass) -> usize {
        match class {
            PacketClass::Driver => self.driver,
            PacketClass::App => self.app,
            PacketClass::Rx => self.rx,
        }
    }
}

enum Slot<'a> {
    Constructed(Packet<'a>),
    Unconstructed(u8, &'a mut [u8]),
}

/// Flags of a packet sitting in its pool
pub(crate) const fn idle_flags(class: PacketClass) -> PacketFlags {
    match class {
        PacketClass::Driver => PacketFlags::NONE,
        PacketClass::App => PacketFlags::APP_OWNED,
        PacketClass::Rx => PacketFlags::from_bits(
            PacketFlags::FOR_RX.into_bits() | PacketFlags::APP_OWNED.into_bits(),
        ),
    }
}

fn construct(pool: PoolId, class: PacketClass, slot: u8, record: &mut [u8]) -> Packet<'_> {
    let origin = Origin { pool, class, slot };
    let id = PacketId::from_u8_truncating(slot);
    internal::new_packet(origin, record, idle_flags(class), id)
}

impl<'a, M: RawMutex> PacketPool<'a, M> {
    /// Builds the pool over the first `driver_count`, `app_count` and `rx_count` buffers.
    ///
    /// Counts must not exceed the buffer slices or the per-class limits.
    pub(crate) fn new(
        id: PoolId,
        driver: &'a mut [SmallPacketBuffer],
        app: &'a mut [LargePacketBuffer],
        rx: &'a mut [LargePacketBuffer],
        driver_count: usize,
        app_count: usize,
        rx_count: usize,
    ) -> Self {
        let mut inner = Inner {
            driver: Vec::new(),
            app: Vec::new(),
            app_unconstructed: Vec::new(),
            rx: Vec::new(),
            capacity: ClassCounts {
                driver: driver_count,
                app: app_count,
                rx: rx_count,
            },
            rx_trigger: WakerRegistration::new(),
        };

        // Free lists pop from the back; pushing in reverse hands out slot 0 first
        for (slot, buffer) in driver.iter_mut().take(driver_count).enumerate().rev() {
            let packet = construct(id, PacketClass::Driver, slot as u8, buffer.record_mut());
            unwrap!(inner.driver.push(packet).ok());
        }
        for (slot, buffer) in app.iter_mut().take(app_count).enumerate().rev() {
            unwrap!(inner.app_unconstructed.push((slot as u8, buffer.record_mut())).ok());
        }
        for (slot, buffer) in rx.iter_mut().take(rx_count).enumerate().rev() {
            let packet = construct(id, PacketClass::Rx, slot as u8, buffer.record_mut());
            unwrap!(inner.rx.push(packet).ok());
        }

        Self {
            id,
            inner: Mutex::new(RefCell::new(inner)),
        }
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Takes a transmit packet of the given class. Never blocks.
    pub fn acquire(&self, class: Ownership) -> Option<Packet<'a>> {
        let slot = self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            match class {
                Ownership::Driver => inner.driver.pop().map(Slot::Constructed),
                Ownership::App => match inner.app.pop() {
                    Some(packet) => Some(Slot::Constructed(packet)),
                    None => inner
                        .app_unconstructed
                        .pop()
                        .map(|(slot, record)| Slot::Unconstructed(slot, record)),
                },
            }
        })?;

        // Zeroing a large buffer stays outside the critical section
        let packet = match slot {
            Slot::Constructed(packet) => packet,
            Slot::Unconstructed(slot, record) => {
                debug!("Constructing app packet {}", slot);
                construct(self.id, PacketClass::App, slot, record)
            }
        };
        Some(packet)
    }

    /// Takes a free receive packet.
    pub fn acquire_rx(&self) -> Option<Packet<'a>> {
        self.inner.lock(|cell| cell.borrow_mut().rx.pop())
    }

    pub fn has_free_rx(&self) -> bool {
        self.inner.lock(|cell| !cell.borrow().rx.is_empty())
    }

    /// Registers a waker to be woken when a receive packet is released.
    pub fn register_rx_waker(&self, waker: &Waker) {
        self.inner.lock(|cell| cell.borrow_mut().rx_trigger.register(waker))
    }

    /// Returns a packet to its originating pool.
    ///
    /// Clears the flags and the data size; the data bytes are left as they are.
    /// Packets of another pool are refused, and so is any packet that would take its class
    /// above capacity.
    pub fn release(&self, mut packet: Packet<'a>) -> Result<(), ReleaseError<'a>> {
        if packet.origin().pool != self.id {
            warn!("Refusing packet of another pool");
            return Err(ReleaseError::Foreign(packet));
        }

        let class = packet.class();
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let free = match class {
                PacketClass::Driver => inner.driver.len(),
                PacketClass::App => inner.app.len() + inner.app_unconstructed.len(),
                PacketClass::Rx => inner.rx.len(),
            };
            if free >= inner.capacity.get(class) {
                warn!("Refusing packet {} of a full pool", packet.origin().slot);
                return Err(ReleaseError::Foreign(packet));
            }

            internal::reset_packet(&mut packet, idle_flags(class));
            match class {
                PacketClass::Driver => unwrap!(inner.driver.push(packet).ok()),
                PacketClass::App => unwrap!(inner.app.push(packet).ok()),
                PacketClass::Rx => {
                    unwrap!(inner.rx.push(packet).ok());
                    inner.rx_trigger.wake();
                }
            }
            Ok(())
        })
    }

    /// Packets currently obtainable per class, unconstructed app packets included
    pub fn available(&self) -> ClassCounts {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            ClassCounts {
                driver: inner.driver.len(),
                app: inner.app.len() + inner.app_unconstructed.len(),
                rx: inner.rx.len(),
            }
        })
    }

    /// Total packets per class
    pub fn capacity(&self) -> ClassCounts {
        self.inner.lock(|cell| cell.borrow().capacity)
    }

    /// Number of app packets constructed so far
    #[cfg(test)]
    pub fn constructed_app_packets(&self) -> usize {
        self.inner.lock(|cell| {
            let inner = cell.borrow();
            inner.capacity.app - inner.app_unconstructed.len()
        })
    }
}
