//! In-memory serial link for the BDPP stack
//!
//! The crate provides a software transfer engine that moves packet records over in-memory
//! wires. It stands in for the UART and DMA hardware when simulating a link on a host and
//! in tests.
//!
//! # Features
//!
//! * Loop-back to the same engine or cross-connection of two engines
//! * Wire backpressure: a full wire holds the transmission, like RTS/CTS flow control
//! * Record injection and capture for byte-exact checks
//!
//! # Limitations
//!
//! * Records move whole; there is no byte framing or line noise
//! * Link parameters are validated but have no timing effect
//!
//! # Examples
//!
//! ```
//! use bdpp_loopback::{LoopbackEngine, Wire};
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//!
//! static HOST_TO_DEVICE: Wire<CriticalSectionRawMutex> = Wire::new();
//! static DEVICE_TO_HOST: Wire<CriticalSectionRawMutex> = Wire::new();
//!
//! let host = LoopbackEngine::new(&HOST_TO_DEVICE, &DEVICE_TO_HOST);
//! let device = LoopbackEngine::new(&DEVICE_TO_HOST, &HOST_TO_DEVICE);
//! # drop((host, device));
//! ```

#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod engine;
mod wire;

pub use engine::{InstallError, LoopbackEngine, POSTED_RX_CAPACITY};
pub use wire::{MAX_RECORD_LEN, Record, WIRE_DEPTH, Wire, WireError};
