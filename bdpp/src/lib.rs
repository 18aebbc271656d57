//! # BDPP
//!
//! Bidirectional packet protocol engine. The library turns one full-duplex, DMA-backed serial
//! channel into a transport carrying up to 16 independent streams in each direction. It works
//! in no_std environments over a fixed set of user-provided packet buffers and never allocates
//! after initialization.
//!
//! ## Architecture
//!
//! ```text
//!  producers                                        consumers
//!      │ acquire/queue                  get/receive/release ▲
//!      ▼                                                    │
//! ┌─────────────────────────── Engine ──────────────────────┴───┐
//! │ ┌────────────┐   ┌─────────┐             ┌────────────────┐ │
//! │ │ PacketPool ├──►│ TxQueue │             │ RxDemultiplexer│ │
//! │ └─────▲──────┘   └────┬────┘             └───────▲────────┘ │
//! └───────┼───────────────┼──────────────────────────┼──────────┘
//!         │ recycle       │ Link                     │ route
//! ┌───────┴───────────────▼──────────────────────────┴──────────┐
//! │                       HardwareBridge                        │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//!                         TransferEngine
//! ```
//! Components:
//! * _Packet_ is a unique handle to one pre-allocated record buffer. Moving it transfers the
//!   buffer, so a packet is always in exactly one place: a free pool, the TX queue, a stream
//!   queue, the transfer engine, or the hands of a producer or consumer.
//! * _PacketPool_ holds small driver-owned packets, large app-owned packets and free receive
//!   packets. Exhaustion is reported, never waited on.
//! * _TxQueue_ is a FIFO of packets ready for transmission.
//! * _RxDemultiplexer_ keeps one FIFO of received packets per stream.
//! * _HardwareBridge_ runs in the completion context. It submits queued packets, keeps a set
//!   of receive buffers posted with the transfer engine and routes finished transfers.
//! * _Recycler_ returns sent and unusable packets to their pools and hands received ones to
//!   the stream queues.
//! * _TransferEngine_ is the driver-provided serial hardware, see the `bdpp-driver` crate.
//!
//! ## Concurrency model
//!
//! Producers and consumers run in a mainline context, the bridge in a completion context that
//! may preempt it. Each shared structure sits behind its own blocking mutex, held for a single
//! push or pop:
//! * _CriticalSectionRawMutex_ allows the bridge to run in an interrupt.
//! * _ThreadModeRawMutex_ or _NoopRawMutex_ fit when every user is a task of one executor.
//!
//! ## Example
//!
//! ```
//! use bdpp::config::{Config, LinkConfig};
//! use bdpp::core::{Ownership, StreamId};
//! use bdpp::engine::Engine;
//! use bdpp::storage::Storage;
//! use bdpp_loopback::{LoopbackEngine, Wire};
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use static_cell::StaticCell;
//!
//! static STORAGE: StaticCell<Storage> = StaticCell::new();
//! static ENGINE: StaticCell<Engine<'static, CriticalSectionRawMutex>> = StaticCell::new();
//! static WIRE: Wire<CriticalSectionRawMutex> = Wire::new();
//!
//! let storage = Storage::init_zeroed(STORAGE.uninit());
//! let engine = ENGINE.init(Engine::new(storage, Config::default()).unwrap());
//! let transfer = LoopbackEngine::new(&WIRE, &WIRE);
//! let mut bridge = engine.initialize(transfer, &LinkConfig::default()).unwrap();
//!
//! let stream = StreamId::new(3).unwrap();
//! let mut packet = engine.acquire_tx_packet(Ownership::Driver, stream).unwrap();
//! packet.append_slice(b"ping").unwrap();
//! engine.queue_tx_packet(packet).unwrap();
//!
//! while !engine.rx_packet_available(stream) {
//!     bridge.on_interrupt();
//! }
//! let packet = engine.get_rx_packet(stream).unwrap();
//! assert_eq!(packet.data(), b"ping");
//! engine.release_packet(packet).unwrap();
//! ```
#![no_std]

pub use bdpp_core as core;
pub use bdpp_driver::{packet, transfer};

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod bridge;
pub mod config;
pub mod engine;
mod pool;
mod recycler;
mod rx_demux;
pub mod storage;
mod tx_queue;
mod utils;

pub use pool::{ClassCounts, ReleaseError};
pub use tx_queue::TxError;
