use bdpp_core::{PacketFlags, PacketId, StreamId};
use bdpp_driver::config::{DataBits, LinkConfig};
use bdpp_driver::internal;
use bdpp_driver::packet::{HEADER_LEN, Origin, Packet, PacketClass, PoolId};
use bdpp_driver::transfer::{Completion, TransferEngine};
use bdpp_loopback::{InstallError, LoopbackEngine, WIRE_DEPTH, Wire, WireError};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use futures_test::task::new_count_waker;
use std::boxed::Box;

type TestWire = Wire<CriticalSectionRawMutex>;

fn leak_wire() -> &'static TestWire {
    Box::leak(Box::new(TestWire::new()))
}

fn make_packet(class: PacketClass, slot: u8, data_size: usize) -> Packet<'static> {
    let buffer = Box::leak(vec![0u8; HEADER_LEN + data_size].into_boxed_slice());
    let origin = Origin {
        pool: PoolId(1),
        class,
        slot,
    };
    let flags = match class {
        PacketClass::Rx => PacketFlags::FOR_RX | PacketFlags::APP_OWNED | PacketFlags::READY,
        _ => PacketFlags::READY,
    };
    internal::new_packet(origin, buffer, flags, PacketId::new(slot).unwrap())
}

fn installed(
    tx_wire: &'static TestWire,
    rx_wire: &'static TestWire,
) -> LoopbackEngine<'static, 'static, CriticalSectionRawMutex> {
    let mut engine = LoopbackEngine::new(tx_wire, rx_wire);
    engine.install(&LinkConfig::default()).unwrap();
    engine
}

#[test]
fn test_install_checks() {
    let wire = leak_wire();
    let mut engine = LoopbackEngine::new(wire, wire);

    let mut config = LinkConfig::default();
    config.baud_rate = 0;
    assert_eq!(engine.install(&config), Err(InstallError::UnsupportedBaudRate));

    config.baud_rate = 115_200;
    config.data_bits = DataBits::Seven;
    assert_eq!(engine.install(&config), Err(InstallError::UnsupportedDataBits));
    assert!(engine.link_config().is_none());

    engine.install(&LinkConfig::default()).unwrap();
    assert_eq!(engine.link_config().unwrap().baud_rate, 1_152_000);
    assert_eq!(
        engine.install(&LinkConfig::default()),
        Err(InstallError::AlreadyInstalled)
    );
}

#[test]
fn test_send_puts_exact_record_on_wire() {
    let tx_wire = leak_wire();
    let rx_wire = leak_wire();
    let mut engine = installed(tx_wire, rx_wire);

    let mut packet = make_packet(PacketClass::Driver, 2, 32);
    packet.set_stream_id(StreamId::new(12).unwrap());
    packet.append_slice(&[0xde, 0xad]).unwrap();
    engine.submit(packet);

    match engine.poll_completion() {
        Some(Completion::Sent(packet)) => assert_eq!(packet.origin().slot, 2),
        _ => panic!("send not completed"),
    }
    assert!(engine.poll_completion().is_none());

    let record = tx_wire.try_receive().unwrap();
    assert_eq!(record, [0x10, 0xc2, 0x02, 0x00, 0xde, 0xad]);
    assert!(rx_wire.is_empty());
}

#[test]
fn test_receive_fills_posted_buffers_in_order() {
    let tx_wire = leak_wire();
    let rx_wire = leak_wire();
    let mut engine = installed(tx_wire, rx_wire);

    // Nothing posted, the record stays on the wire
    rx_wire.try_send(&[0x00, 0x50, 0x01, 0x00, 0x01]).unwrap();
    assert!(engine.poll_completion().is_none());
    assert_eq!(rx_wire.len(), 1);

    engine.post_receive(make_packet(PacketClass::Rx, 0, 64));
    engine.post_receive(make_packet(PacketClass::Rx, 1, 64));
    rx_wire.try_send(&[0x00, 0x61, 0x02, 0x00, 0x02, 0x03]).unwrap();

    let mut slots = Vec::new();
    while let Some(completion) = engine.poll_completion() {
        let Completion::Received(packet) = completion else {
            panic!("unexpected send completion");
        };
        assert!(packet.is_flag_set(PacketFlags::DONE));
        slots.push((packet.origin().slot, packet.stream_id().into_u8(), packet.data().to_vec()));
    }
    assert_eq!(slots, [(0, 5, vec![0x01]), (1, 6, vec![0x02, 0x03])]);
    assert_eq!(engine.posted(), 0);
}

#[test]
fn test_malformed_record_reported() {
    let wire = leak_wire();
    let mut engine = installed(wire, wire);
    engine.post_receive(make_packet(PacketClass::Rx, 3, 8));

    // Declares 16 data bytes, buffer holds 8
    wire.try_send(&[0x00, 0x00, 0x10, 0x00]).unwrap();
    match engine.poll_completion() {
        Some(Completion::Received(packet)) => {
            assert!(packet.is_flag_clear(PacketFlags::DONE));
            assert!(packet.is_empty());
        }
        _ => panic!("receive not completed"),
    }
}

#[test]
fn test_full_wire_holds_transmission() {
    let tx_wire = leak_wire();
    let rx_wire = leak_wire();
    let mut engine = installed(tx_wire, rx_wire);
    for _ in 0..WIRE_DEPTH {
        tx_wire.try_send(&[0x00, 0x00, 0x00, 0x00]).unwrap();
    }
    assert_eq!(tx_wire.try_send(&[0; 4]), Err(WireError::Full));

    engine.submit(make_packet(PacketClass::App, 0, 4072));
    assert!(engine.poll_completion().is_none());
    assert!(engine.is_sending());

    let (waker, count) = new_count_waker();
    engine.register_waker(&waker);
    tx_wire.try_receive().unwrap();
    assert_eq!(count.get(), 1);

    assert!(matches!(engine.poll_completion(), Some(Completion::Sent(_))));
    assert!(!engine.is_sending());
}

#[test]
fn test_oversized_injection_rejected() {
    let wire = leak_wire();
    let record = vec![0u8; bdpp_loopback::MAX_RECORD_LEN + 1];
    assert_eq!(wire.try_send(&record), Err(WireError::TooLong));
    assert!(wire.is_empty());
}
