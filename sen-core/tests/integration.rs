//! Testes de integração para sen-core

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sen_core::*;

#[derive(Clone, Default)]
struct Recorder {
    received: Arc<Mutex<Vec<Measurement>>>,
}

impl Recorder {
    fn received(&self) -> Vec<Measurement> {
        self.received.lock().unwrap().clone()
    }
}

impl Sink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn consume(&mut self, measurement: &Measurement) -> SinkResult<()> {
        self.received.lock().unwrap().push(measurement.clone());
        Ok(())
    }
}

struct AlwaysFails;

impl Sink for AlwaysFails {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn consume(&mut self, _measurement: &Measurement) -> SinkResult<()> {
        Err(SinkError::Io {
            sink: "always-fails".into(),
            message: "connection reset".into(),
        })
    }
}

#[tokio::test]
async fn test_end_to_end_single_cycle() {
    let recorder = Recorder::default();
    let config = SchedulerConfig::from_secs(0.01, Some(1)).unwrap();
    let mut scheduler = Scheduler::new(
        MockSensor::new(),
        FanOut::new().with_sink(recorder.clone()),
        config,
    );

    scheduler.run().await.unwrap();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    let m = &received[0];
    assert_eq!(m.len(), 2);
    assert_eq!(m.get(Quantity::Temperature), Some(28.5));
    assert_eq!(m.get(Quantity::Humidity), Some(25.2));
    assert!(m.timestamp_ms() > 0);
}

#[tokio::test]
async fn test_three_cycles_then_stopped() {
    let recorder = Recorder::default();
    let config = SchedulerConfig::from_secs(0.01, Some(3)).unwrap();
    let mut scheduler = Scheduler::new(
        MockSensor::new(),
        FanOut::new().with_sink(recorder.clone()),
        config,
    );
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.delivered + stats.failed, 3);
    assert_eq!(recorder.received().len(), 3);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test]
async fn test_failing_sink_does_not_block_healthy_sink() {
    let recorder = Recorder::default();
    let config = SchedulerConfig::from_secs(0.001, Some(10)).unwrap();
    let mut scheduler = Scheduler::new(
        MockSensor::new(),
        FanOut::new()
            .with_sink(AlwaysFails)
            .with_sink(recorder.clone()),
        config,
    );

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.delivered, 10);
    assert_eq!(stats.sink_failures, 10);
    assert_eq!(recorder.received().len(), 10);
}

#[tokio::test]
async fn test_unbounded_run_stops_on_request() {
    let recorder = Recorder::default();
    let config = SchedulerConfig::from_secs(0.005, None).unwrap();
    let mut scheduler = Scheduler::new(
        MockSensor::new(),
        FanOut::new().with_sink(recorder.clone()),
        config,
    );
    let stop = scheduler.stop_handle();

    let started = Instant::now();
    let task = tokio::spawn(async move {
        let stats = scheduler.run().await;
        (scheduler, stats)
    });

    tokio::time::sleep(Duration::from_millis(40)).await;
    stop.stop();
    let (scheduler, stats) = task.await.unwrap();
    let stats = stats.unwrap();

    assert!(stats.cycles >= 1);
    assert_eq!(stats.cycles as usize, recorder.received().len());
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_invalid_configuration_rejected_before_run() {
    assert!(matches!(
        SchedulerConfig::from_secs(0.0, Some(1)),
        Err(SenError::Config(_))
    ));
    assert!(matches!(
        SchedulerConfig::from_secs(-2.0, None),
        Err(SenError::Config(_))
    ));
    assert!(matches!(
        SchedulerConfig::from_secs(1.0, Some(0)),
        Err(SenError::Config(_))
    ));
}

#[test]
fn test_unknown_driver_name() {
    let registry = DriverRegistry::with_builtin();
    assert_eq!(
        registry.resolve("tmp102").err(),
        Some(SenError::DriverNotFound("tmp102".into()))
    );
}

#[test]
fn test_acquisition_config_to_scheduler() {
    let config = AcquisitionConfig::from_toml("sensor = \"bmp180\"\ninterval = 0.25\ncycles = 4").unwrap();
    let scheduler = config.validate().unwrap();
    assert_eq!(scheduler.interval, Duration::from_millis(250));
    assert_eq!(scheduler.cycles, CycleCount::from_option(Some(4)).unwrap());
    assert_eq!(config.driver_name(), "bmp180");
}
