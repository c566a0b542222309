//! Testes integrados do módulo sen-core

use std::time::Duration;

use crate::calibration::fixtures::{bme280_blocks, bme280_reference};
use crate::drivers::testing::SimBus;
use crate::sink::testing::{FailingSink, RecordingSink};
use crate::*;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRO + DRIVER + SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════════

fn bme280_bus(addr: Address) -> SimBus {
    let bus = SimBus::new();
    let (a, b) = bme280_blocks(&bme280_reference());
    bus.load(addr, calibration::BME280_CALIB_00, &a);
    bus.load(addr, calibration::BME280_CALIB_26, &b);
    bus.load(addr, 0xF7, &[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30]);
    bus
}

#[tokio::test]
async fn test_registry_driver_through_scheduler() {
    let registry = DriverRegistry::with_builtin();
    let bus = bme280_bus(0x76);
    let driver = registry
        .create("BME280", Box::new(bus), Some(0x76))
        .map_err(|e| e.to_string())
        .unwrap();
    assert_eq!(driver.address(), 0x76);

    let sink = RecordingSink::new();
    let config = SchedulerConfig::from_secs(0.001, Some(2)).unwrap();
    let mut scheduler = Scheduler::new(driver, FanOut::new().with_sink(sink.clone()), config);
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.delivered, 2);
    for m in sink.received() {
        assert!((m.get(Quantity::Temperature).unwrap() - 25.08247793081682).abs() < 1e-9);
        assert!((m.get(Quantity::Pressure).unwrap() - 100653.25814481472).abs() < 1e-6);
        assert!((m.get(Quantity::Humidity).unwrap() - 55.000712804837015).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_bus_failure_mid_run_is_reported_not_fatal() {
    let bus = bme280_bus(0x77);
    let driver = Bme280::new(bus.clone(), 0x77).unwrap();

    let sink = RecordingSink::new();
    let config = SchedulerConfig::new(Duration::from_millis(1), CycleCount::from_option(Some(3)).unwrap())
        .unwrap();
    let mut scheduler = Scheduler::new(driver, FanOut::new().with_sink(sink.clone()), config);

    assert!(scheduler.run_cycle().is_delivered());
    bus.fail(BusError::Nack { addr: 0x77 });
    assert_eq!(
        scheduler.run_cycle(),
        CycleOutcome::Failed(SenError::Bus(BusError::Nack { addr: 0x77 }))
    );
    bus.recover();
    assert!(scheduler.run_cycle().is_delivered());

    assert_eq!(scheduler.stats().cycles, 3);
    assert_eq!(scheduler.stats().failed, 1);
    assert_eq!(sink.received().len(), 2);
    assert_eq!(sink.failures()[0].cycle, 2);
}

#[test]
fn test_init_failure_prevents_scheduler() {
    let registry = DriverRegistry::with_builtin();
    let bus = SimBus::new();
    bus.fail(BusError::NotPresent { addr: 0x77 });
    let err = registry.create("bmp180", Box::new(bus), None).err().unwrap();
    assert!(matches!(err, SenError::DriverInit { driver: "bmp180", .. }));
    assert!(!err.is_cycle_error());
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAN-OUT COM SINKS REAIS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_print_broadcast_and_publish_receive_same_stream() {
    let (broadcast, handle) = BroadcastSink::new(8);
    let (publish, mut queue) = PublishSink::new(sink::default_topic("mock-sensor"), 8);
    let print = PrintSink::new("mock-sensor", OutputFormat::Json, false, Vec::new(), Vec::new());
    let mut stream = handle.subscribe();

    let fanout = FanOut::new()
        .with_sink(print)
        .with_sink(broadcast)
        .with_sink(FailingSink)
        .with_sink(publish);
    let config = SchedulerConfig::from_secs(0.001, Some(3)).unwrap();
    let mut scheduler = Scheduler::new(MockSensor::new(), fanout, config);
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.sink_failures, 3);

    for _ in 0..3 {
        let m = stream.recv().await.unwrap();
        assert_eq!(m.get(Quantity::Humidity), Some(25.2));
        let message = queue.recv().await.unwrap();
        assert_eq!(message.topic, "sensor/mock-sensor");
        assert!(message.payload.contains("\"temperature\":28.5"));
    }
    assert!(handle.latest().is_some());
}

#[tokio::test]
async fn test_sink_requesting_stop_ends_after_current_cycle() {
    struct StopAfter {
        handle: StopHandle,
        after: usize,
        seen: usize,
    }

    impl Sink for StopAfter {
        fn name(&self) -> &str {
            "stop-after"
        }

        fn consume(&mut self, _measurement: &Measurement) -> SinkResult<()> {
            self.seen += 1;
            if self.seen == self.after {
                self.handle.stop();
            }
            Ok(())
        }
    }

    let recorder = RecordingSink::new();
    let config = SchedulerConfig::from_secs(0.001, None).unwrap();
    let mut scheduler = Scheduler::new(MockSensor::new(), FanOut::new(), config);
    let handle = scheduler.stop_handle();
    scheduler.fanout_mut().add(StopAfter {
        handle,
        after: 3,
        seen: 0,
    });
    scheduler.fanout_mut().add(recorder.clone());

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.cycles, 3);
    // o ciclo em andamento termina: o segundo sink também recebe a 3ª medição
    assert_eq!(recorder.received().len(), 3);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}
