use bdpp::bridge::HardwareBridge;
use bdpp::config::{Config, LinkConfig};
use bdpp::core::{Ownership, StreamId, Usage};
use bdpp::engine::Engine;
use bdpp::storage::Storage;
use bdpp_loopback::{LoopbackEngine, Wire};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use futures_executor::LocalPool;
use futures_task::LocalSpawn;
use std::boxed::Box;
use std::sync::atomic::{AtomicBool, Ordering};

type TestEngine = Engine<'static, CriticalSectionRawMutex>;
type Bridge = HardwareBridge<'static, LoopbackEngine<'static, 'static, CriticalSectionRawMutex>>;

const STATUS_STREAM: StreamId = StreamId::new(4).unwrap();
const LOG_STREAM: StreamId = StreamId::new(0).unwrap();

fn looped_engine() -> (&'static TestEngine, Bridge) {
    let storage = Storage::init_zeroed(Box::leak(Box::<Storage>::new_uninit()));
    let engine: &'static TestEngine =
        Box::leak(Box::new(Engine::new(storage, Config::default()).unwrap()));
    let wire = Box::leak(Box::new(Wire::<CriticalSectionRawMutex>::new()));
    let bridge = engine
        .initialize(LoopbackEngine::new(wire, wire), &LinkConfig::default())
        .unwrap();
    (engine, bridge)
}

fn send(engine: &TestEngine, stream: StreamId, usage: Usage, payload: &[u8]) {
    let mut packet = engine.acquire_tx_packet(Ownership::Driver, stream).unwrap();
    packet.set_usage(usage);
    packet.append_slice(payload).unwrap();
    engine.queue_tx_packet(packet).unwrap();
}

#[test]
fn test_receive_wakes_on_delivery() {
    let mut executor = LocalPool::new();
    let spawner = executor.spawner();

    let (engine, bridge) = looped_engine();
    let complete = Box::leak(Box::new(AtomicBool::new(false)));

    spawner
        .spawn_local_obj(Box::new(bridge_runner(bridge)).into())
        .unwrap();
    spawner
        .spawn_local_obj(Box::new(receive_status(engine, complete)).into())
        .unwrap();

    executor.run_until_stalled();
    assert!(!complete.load(Ordering::SeqCst));

    // Other streams leave the waiting receiver alone
    send(engine, LOG_STREAM, Usage::Print, b"booting");
    executor.run_until_stalled();
    assert!(!complete.load(Ordering::SeqCst));

    send(engine, STATUS_STREAM, Usage::Response, b"ready");
    executor.run_until_stalled();
    assert!(complete.load(Ordering::SeqCst));

    let log = engine.get_rx_packet(LOG_STREAM).unwrap();
    assert_eq!(log.data(), b"booting");
    engine.release_packet(log).unwrap();
}

#[test]
fn test_select_between_streams() {
    let mut executor = LocalPool::new();
    let spawner = executor.spawner();

    let (engine, bridge) = looped_engine();
    let complete = Box::leak(Box::new(AtomicBool::new(false)));

    spawner
        .spawn_local_obj(Box::new(bridge_runner(bridge)).into())
        .unwrap();
    spawner
        .spawn_local_obj(Box::new(receive_any(engine, complete)).into())
        .unwrap();

    executor.run_until_stalled();
    send(engine, LOG_STREAM, Usage::Print, b"first");
    send(engine, STATUS_STREAM, Usage::Response, b"second");
    executor.run_until_stalled();
    assert!(complete.load(Ordering::SeqCst));

    // Dropping the losing receive loses no packet
    let packet = engine.get_rx_packet(STATUS_STREAM).unwrap();
    assert_eq!(packet.data(), b"second");
    engine.release_packet(packet).unwrap();
    assert!(engine.rx_readiness().is_empty());
}

async fn bridge_runner(mut bridge: Bridge) {
    bridge.run().await
}

async fn receive_status(engine: &'static TestEngine, complete: &'static AtomicBool) {
    let packet = engine.receive(STATUS_STREAM).await;
    assert_eq!(packet.usage(), Some(Usage::Response));
    assert_eq!(packet.data(), b"ready");
    engine.release_packet(packet).unwrap();

    complete.store(true, Ordering::SeqCst);
}

async fn receive_any(engine: &'static TestEngine, complete: &'static AtomicBool) {
    match select(engine.receive(LOG_STREAM), engine.receive(STATUS_STREAM)).await {
        Either::First(packet) => {
            assert_eq!(packet.data(), b"first");
            engine.release_packet(packet).unwrap();
        }
        Either::Second(_) => panic!("log packet was sent first"),
    }

    complete.store(true, Ordering::SeqCst);
}
