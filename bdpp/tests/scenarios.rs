use bdpp::bridge::HardwareBridge;
use bdpp::config::{Config, LinkConfig, RxOverrunPolicy};
use bdpp::core::{Ownership, Segment, StreamId, Usage};
use bdpp::engine::Engine;
use bdpp::packet::PacketClass;
use bdpp::storage::Storage;
use bdpp::{ReleaseError, TxError};
use bdpp_loopback::{LoopbackEngine, Wire};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use std::boxed::Box;

type TestEngine = Engine<'static, CriticalSectionRawMutex>;
type TestWire = Wire<CriticalSectionRawMutex>;
type Bridge = HardwareBridge<'static, LoopbackEngine<'static, 'static, CriticalSectionRawMutex>>;

fn stream(value: u8) -> StreamId {
    StreamId::new(value).unwrap()
}

fn leak_wire() -> &'static TestWire {
    Box::leak(Box::new(TestWire::new()))
}

fn make_engine(config: Config) -> &'static TestEngine {
    let storage = Storage::init_zeroed(Box::leak(Box::<Storage>::new_uninit()));
    Box::leak(Box::new(Engine::new(storage, config).unwrap()))
}

fn connect(engine: &'static TestEngine, tx: &'static TestWire, rx: &'static TestWire) -> Bridge {
    engine
        .initialize(LoopbackEngine::new(tx, rx), &LinkConfig::default())
        .unwrap()
}

fn looped(config: Config) -> (&'static TestEngine, Bridge) {
    let engine = make_engine(config);
    let wire = leak_wire();
    (engine, connect(engine, wire, wire))
}

fn send(engine: &TestEngine, class: Ownership, stream: StreamId, payload: &[u8]) {
    let mut packet = engine.acquire_tx_packet(class, stream).unwrap();
    packet.append_slice(payload).unwrap();
    engine.queue_tx_packet(packet).unwrap();
}

fn settle(host_bridge: &mut Bridge, device_bridge: &mut Bridge) {
    loop {
        let host_busy = host_bridge.on_interrupt();
        let device_busy = device_bridge.on_interrupt();
        if !host_busy && !device_busy {
            break;
        }
    }
}

fn assert_all_home(engine: &TestEngine, bridge: &Bridge) {
    let census = engine.census();
    assert_eq!(census.free.driver, engine.capacity(PacketClass::Driver));
    assert_eq!(census.free.app, engine.capacity(PacketClass::App));
    assert_eq!(census.free.rx + bridge.armed(), engine.capacity(PacketClass::Rx));
    assert_eq!(census.tx_queued, 0);
    assert_eq!(census.rx_queued, 0);
}

#[test]
fn test_streams_keep_fifo_order() {
    let (engine, mut bridge) = looped(Config::default());

    send(engine, Ownership::Driver, stream(3), b"A");
    send(engine, Ownership::App, stream(7), b"B");
    send(engine, Ownership::Driver, stream(3), b"C");
    while bridge.on_interrupt() {}

    let mut readiness = engine.rx_readiness();
    assert_eq!(readiness.len(), 2);
    assert!(readiness.contains(stream(3)) && readiness.contains(stream(7)));

    let a = engine.get_rx_packet(stream(3)).unwrap();
    let c = engine.get_rx_packet(stream(3)).unwrap();
    assert!(engine.get_rx_packet(stream(3)).is_none());
    assert_eq!((a.data(), c.data()), (&b"A"[..], &b"C"[..]));

    readiness = engine.rx_readiness();
    assert_eq!(readiness.first(), Some(stream(7)));
    let b = engine.get_rx_packet(stream(7)).unwrap();
    assert_eq!(b.data(), b"B");

    for packet in [a, b, c] {
        engine.release_packet(packet).unwrap();
    }
    while bridge.on_interrupt() {}
    assert_all_home(engine, &bridge);
}

#[test]
fn test_request_response_between_peers() {
    let host_to_device = leak_wire();
    let device_to_host = leak_wire();
    let host = make_engine(Config::default());
    let device = make_engine(Config::default());
    let mut host_bridge = connect(host, host_to_device, device_to_host);
    let mut device_bridge = connect(device, device_to_host, host_to_device);

    let mut request = host.acquire_tx_packet(Ownership::Driver, stream(1)).unwrap();
    request.set_usage(Usage::Command);
    request.set_segment(Segment::Only);
    request.append_slice(b"status?").unwrap();
    host.queue_tx_packet(request).unwrap();
    settle(&mut host_bridge, &mut device_bridge);

    // Nothing loops back to the sender
    assert!(host.rx_readiness().is_empty());

    let request = device.get_rx_packet(stream(1)).unwrap();
    assert_eq!(request.usage(), Some(Usage::Command));
    assert_eq!(request.data(), b"status?");
    device.release_packet(request).unwrap();

    let mut response = device.acquire_tx_packet(Ownership::App, stream(1)).unwrap();
    response.set_usage(Usage::Response);
    response.set_segment(Segment::Only);
    response.append_slice(&[0x5a; 600]).unwrap();
    device.queue_tx_packet(response).unwrap();
    settle(&mut host_bridge, &mut device_bridge);

    let response = host.get_rx_packet(stream(1)).unwrap();
    assert_eq!(response.usage(), Some(Usage::Response));
    assert_eq!(response.actual_size(), 600);
    assert!(response.data().iter().all(|&b| b == 0x5a));
    host.release_packet(response).unwrap();
    settle(&mut host_bridge, &mut device_bridge);

    assert_eq!(host.statistics().tx_packets, 1);
    assert_eq!(host.statistics().rx_packets, 1);
    assert_eq!(device.statistics().tx_packets, 1);
    assert_eq!(device.statistics().rx_packets, 1);
    assert_all_home(host, &host_bridge);
    assert_all_home(device, &device_bridge);
}

#[test]
fn test_driver_pool_exhaustion() {
    let mut config = Config::default();
    config.driver_packets = 2;
    let (engine, mut bridge) = looped(config);

    let first = engine.acquire_tx_packet(Ownership::Driver, stream(1)).unwrap();
    let second = engine.acquire_tx_packet(Ownership::Driver, stream(2)).unwrap();
    assert!(engine.acquire_tx_packet(Ownership::Driver, stream(3)).is_none());
    assert_eq!(engine.statistics().tx_exhausted, 1);

    // Sending returns the packet to the pool
    engine.queue_tx_packet(first).unwrap();
    while bridge.on_interrupt() {}
    let third = engine.acquire_tx_packet(Ownership::Driver, stream(3)).unwrap();
    assert!(third.is_empty());

    engine.release_packet(second).unwrap();
    engine.release_packet(third).unwrap();
    let received = engine.get_rx_packet(stream(1)).unwrap();
    assert!(received.is_empty());
    engine.release_packet(received).unwrap();
    while bridge.on_interrupt() {}
    assert_all_home(engine, &bridge);
}

#[test]
fn test_stall_resumes_after_release() {
    let mut config = Config::default();
    config.rx_packets = 4;
    config.armed_rx_packets = 2;
    config.rx_overrun_policy = RxOverrunPolicy::Stall;
    let (engine, mut bridge) = looped(config);

    for seq in 0..6u8 {
        send(engine, Ownership::Driver, stream(2), &[seq]);
    }
    while bridge.on_interrupt() {}

    let stats = engine.statistics();
    assert_eq!(stats.tx_packets, 6);
    assert_eq!(stats.rx_packets, 4);
    assert_eq!(stats.rx_stalls, 1);
    assert_eq!(bridge.armed(), 0);
    assert_eq!(engine.census().rx_queued, 4);

    let mut expected = 0u8;
    while expected < 6 {
        if let Some(packet) = engine.get_rx_packet(stream(2)) {
            assert_eq!(packet.data(), [expected]);
            expected += 1;
            engine.release_packet(packet).unwrap();
        }
        bridge.on_interrupt();
    }

    while bridge.on_interrupt() {}
    let stats = engine.statistics();
    assert_eq!(stats.rx_packets, 6);
    assert_eq!(stats.rx_dropped, 0);
    assert_eq!(bridge.armed(), 2);
    assert_all_home(engine, &bridge);
}

#[test]
fn test_drop_newest_keeps_receiving() {
    let mut config = Config::default();
    config.rx_packets = 2;
    config.armed_rx_packets = 1;
    config.rx_overrun_policy = RxOverrunPolicy::DropNewest;
    let (engine, mut bridge) = looped(config);

    for seq in 0..4u8 {
        send(engine, Ownership::Driver, stream(9), &[seq]);
    }
    while bridge.on_interrupt() {}

    let stats = engine.statistics();
    assert_eq!(stats.rx_packets, 1);
    assert_eq!(stats.rx_dropped, 3);
    assert_eq!(stats.rx_stalls, 0);
    assert_eq!(bridge.armed(), 1);

    let packet = engine.get_rx_packet(stream(9)).unwrap();
    assert_eq!(packet.data(), [0]);
    assert!(engine.get_rx_packet(stream(9)).is_none());
    engine.release_packet(packet).unwrap();

    send(engine, Ownership::Driver, stream(9), &[4]);
    while bridge.on_interrupt() {}
    let packet = engine.get_rx_packet(stream(9)).unwrap();
    assert_eq!(packet.data(), [4]);
    engine.release_packet(packet).unwrap();
    while bridge.on_interrupt() {}
    assert_all_home(engine, &bridge);
}

#[test]
fn test_packets_stay_with_their_engine() {
    let mut config = Config::default();
    config.driver_packets = 2;
    let (first, mut first_bridge) = looped(config.clone());
    let (second, mut second_bridge) = looped(config);

    let mut packet = first.acquire_tx_packet(Ownership::Driver, stream(5)).unwrap();
    packet.append_slice(b"mine").unwrap();
    let packet = match second.release_packet(packet) {
        Err(ReleaseError::Foreign(packet)) => packet,
        Ok(()) => panic!("foreign packet accepted"),
    };
    assert_eq!(packet.data(), b"mine");
    assert_eq!(second.available(PacketClass::Driver), 2);
    assert_eq!(first.available(PacketClass::Driver), 1);

    let packet = match second.queue_tx_packet(packet) {
        Err(TxError::Foreign(packet)) => packet,
        other => panic!("foreign packet queued: {other:?}"),
    };
    assert_eq!(second.census().tx_queued, 0);
    first.release_packet(packet).unwrap();

    // Receive packets go home the same way
    send(first, Ownership::Driver, stream(5), b"rx");
    while first_bridge.on_interrupt() {}
    while second_bridge.on_interrupt() {}
    let received = first.get_rx_packet(stream(5)).unwrap();
    let free_rx = second.available(PacketClass::Rx);
    let received = second.release_packet(received).unwrap_err().into_packet();
    assert_eq!(received.data(), b"rx");
    assert_eq!(second.available(PacketClass::Rx), free_rx);

    first.release_packet(received).unwrap();
    while first_bridge.on_interrupt() {}
    assert_all_home(first, &first_bridge);
    assert_all_home(second, &second_bridge);
}
