//! BDPP driver interface
//!
//! The crate provides an interface between a serial transfer engine and the BDPP stack.
//! Limited scope facilitates compatibility across versions.
//! Driver crates should depend on this crate. BDPP stack users should depend on
//! the `bdpp` crate instead.
//!
//! A driver implements [`TransferEngine`](transfer::TransferEngine): it installs the serial
//! link, sends packet records and receives records into posted buffers. The stack owns the
//! engine through its hardware bridge and pulls completions from it, so drivers never call
//! back into the stack.
//!
//! A `Link` encompasses two channels used by the bridge:
//! * `Tx` produces packets ready for transmission and takes back sent ones
//! * `Rx` hands out free receive buffers and consumes received packets
//!
//! Every record moves as a [`Packet`](packet::Packet), a unique handle to one pre-allocated
//! buffer. A driver receives into [`Packet::dma_buffer_mut`](packet::Packet::dma_buffer_mut)
//! and finishes with [`Packet::complete_receive`](packet::Packet::complete_receive), which
//! validates the record header.

#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod internal;
pub mod link;
pub mod packet;
pub mod transfer;
