//! sennode - nó de sensor HTTP/WebSocket
//!
//! Roda o scheduler sem limite de ciclos e expõe as medições:
//!
//! ## Endpoints
//! - `GET /health` - Health check
//! - `GET /api/sensor` - Descritor do sensor
//! - `GET /api/measurement` - Última medição (204 antes do primeiro ciclo)
//! - `GET /ws` - Stream WebSocket, um JSON por medição
//!
//! ## Variáveis de Ambiente
//! - `SENNODE_HTTP_ADDRESS`: Endereço de escuta (padrão: 0.0.0.0)
//! - `SENNODE_HTTP_PORT`: Porta (padrão: 8080)
//! - `SENNODE_MQTT_ADDRESS`: Broker MQTT (sem valor, nada é publicado)

mod handlers;
mod models;
mod mqtt;
mod routes;
mod state;

use clap::Parser;
use colored::*;
use sen_core::bus::BoxedBus;
use sen_core::sink::broadcast::DEFAULT_CAPACITY;
use sen_core::sink::publish::{DEFAULT_QUEUE, PublishStats, default_topic, publish_worker};
use sen_core::{
    AcquisitionConfig, Address, BroadcastSink, DriverRegistry, FanOut, PublishSink, Scheduler,
    SenResult, StopHandle, parse_address,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mqtt::{DEFAULT_MQTT_PORT, MqttPublisher};
use state::AppState;

/// Tempo para a fila MQTT esvaziar no encerramento
const PUBLISH_DRAIN: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "sennode")]
#[command(author = "SIL Contributors")]
#[command(version = "2026.1.16")]
#[command(about = "Sensor node serving measurements over HTTP and WebSocket", long_about = None)]
struct Args {
    /// Sensor driver name
    #[arg(value_name = "SENSOR", default_value = sen_core::config::DEFAULT_SENSOR)]
    sensor: String,

    /// Use the simulated sensor instead of the I2C bus
    #[arg(long)]
    mock: bool,

    /// Device address (e.g. 0x76); defaults to the driver's address
    #[arg(short, long, value_parser = address_arg)]
    address: Option<Address>,

    /// I2C bus number
    #[arg(short, long, default_value_t = sen_core::config::DEFAULT_BUS)]
    bus: u8,

    /// Seconds between measurements
    #[arg(short, long, default_value_t = sen_core::config::DEFAULT_INTERVAL_SECS)]
    interval: f64,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "SENNODE_HTTP_ADDRESS")]
    http_address: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080, env = "SENNODE_HTTP_PORT")]
    http_port: u16,

    /// MQTT broker host; measurements are published only when set
    #[arg(long, env = "SENNODE_MQTT_ADDRESS")]
    mqtt_address: Option<String>,

    /// MQTT broker port
    #[arg(long, default_value_t = DEFAULT_MQTT_PORT)]
    mqtt_port: u16,

    /// MQTT topic (default: sensor/<SENSOR>)
    #[arg(long)]
    mqtt_topic: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn acquisition_config(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            sensor: self.sensor.clone(),
            bus: self.bus,
            address: self.address,
            interval: self.interval,
            cycles: None,
            mock: self.mock,
        }
    }

    fn mqtt_topic(&self) -> String {
        self.mqtt_topic
            .clone()
            .unwrap_or_else(|| default_topic(&self.sensor.to_lowercase()))
    }
}

/// Worker de publicação e event loop do cliente MQTT
struct MqttTasks {
    worker: JoinHandle<PublishStats>,
    event_loop: JoinHandle<()>,
}

impl MqttTasks {
    /// Liga o `PublishSink` ao broker, se `--mqtt-address` foi dado
    fn start(args: &Args, fanout: &mut FanOut) -> Option<Self> {
        let host = args.mqtt_address.as_deref().filter(|h| !h.is_empty())?;
        let topic = args.mqtt_topic();
        let client_id = format!("sennode-{}", std::process::id());
        let (publisher, event_loop) = MqttPublisher::connect(host, args.mqtt_port, &client_id);
        let (sink, queue) = PublishSink::new(topic.clone(), DEFAULT_QUEUE);
        fanout.add(sink);

        info!("publishing to MQTT broker {}:{}", host, args.mqtt_port);
        info!("  topic: {}", topic);
        Some(Self {
            worker: tokio::spawn(publish_worker(queue, publisher)),
            event_loop,
        })
    }

    /// Espera a fila esvaziar (o sink já foi descartado) e derruba a conexão
    async fn finish(self) {
        match tokio::time::timeout(PUBLISH_DRAIN, self.worker).await {
            Ok(Ok(stats)) => info!(
                published = stats.published,
                failed = stats.failed,
                "MQTT publishing stopped"
            ),
            Ok(Err(e)) => tracing::warn!(error = %e, "publish worker failed"),
            Err(_) => tracing::warn!("MQTT queue not drained before shutdown"),
        }
        self.event_loop.abort();
    }
}

fn address_arg(s: &str) -> Result<Address, String> {
    parse_address(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing (RUST_LOG wins over -d)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(args.debug).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(args).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "sennode=debug,sen_core=debug,tower_http=debug,rumqttc=debug"
    } else {
        "sennode=info,sen_core=info,tower_http=info,rumqttc=warn"
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = args.acquisition_config();
    let schedule = config.validate()?;
    let driver = DriverRegistry::with_builtin().from_config(&config, open_bus)?;

    let (broadcast, handle) = BroadcastSink::new(DEFAULT_CAPACITY);
    let state = AppState::new(driver.descriptor(), driver.address(), handle);
    let mut fanout = FanOut::new().with_sink(broadcast);
    let mqtt = MqttTasks::start(&args, &mut fanout);
    let mut scheduler = Scheduler::new(driver, fanout, schedule);
    let stop = scheduler.stop_handle();
    let acquisition = tokio::spawn(async move { scheduler.run().await });

    let app = routes::create_router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", args.http_address, args.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("sensor node listening on http://{}", addr);
    info!(
        "  sensor: {} (bus {}, every {}s)",
        config.driver_name(),
        config.bus,
        config.interval
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(stop))
        .await?;

    let stats = acquisition.await??;
    if let Some(mqtt) = mqtt {
        mqtt.finish().await;
    }
    info!(
        cycles = stats.cycles,
        delivered = stats.delivered,
        failed = stats.failed,
        "sensor node stopped"
    );
    Ok(())
}

/// Ctrl-C pede a parada do scheduler e encerra o servidor
async fn shutdown_signal(stop: StopHandle) {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("cannot listen for Ctrl-C, stopping now");
    }
    info!("interrupt received, stopping");
    stop.stop();
}

#[cfg(feature = "linux-hal")]
fn open_bus(bus: u8) -> SenResult<BoxedBus> {
    Ok(sen_core::open_linux_bus(bus)?)
}

#[cfg(not(feature = "linux-hal"))]
fn open_bus(bus: u8) -> SenResult<BoxedBus> {
    Err(sen_core::SenError::Config(format!(
        "cannot open /dev/i2c-{}: built without the linux-hal feature (try --mock)",
        bus
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_runs_unbounded() {
        let args = Args::try_parse_from(["sennode", "--mock", "-i", "0.5"]).unwrap();
        let config = args.acquisition_config();
        assert_eq!(config.cycles, None);
        assert_eq!(config.driver_name(), "mock-sensor");
        assert_eq!(
            config.validate().unwrap().cycles,
            sen_core::CycleCount::Unbounded
        );
    }

    #[test]
    fn test_http_defaults() {
        let args = Args::try_parse_from(["sennode", "si7021", "-a", "0x41"]).unwrap();
        assert_eq!(args.http_address, "0.0.0.0");
        assert_eq!(args.http_port, 8080);
        assert_eq!(args.sensor, "si7021");
        assert_eq!(args.address, Some(0x41));
        assert_eq!(args.bus, 1);
        assert_eq!(args.mqtt_address, None);
    }

    #[test]
    fn test_log_directives() {
        assert!(default_directives(true).starts_with("sennode=debug"));
        assert!(default_directives(false).contains("tower_http=info"));
    }

    #[test]
    fn test_mqtt_flags() {
        let args = Args::try_parse_from(["sennode", "BMP180", "--mqtt-address", "broker.local"])
            .unwrap();
        assert_eq!(args.mqtt_address.as_deref(), Some("broker.local"));
        assert_eq!(args.mqtt_port, 1883);
        assert_eq!(args.mqtt_topic(), "sensor/bmp180");

        let args = Args::try_parse_from([
            "sennode",
            "--mqtt-address",
            "10.0.0.2",
            "--mqtt-port",
            "8883",
            "--mqtt-topic",
            "lab/bench",
        ])
        .unwrap();
        assert_eq!(args.mqtt_port, 8883);
        assert_eq!(args.mqtt_topic(), "lab/bench");
    }

    #[tokio::test]
    async fn test_mqtt_sink_joins_fanout_only_with_address() {
        let args = Args::try_parse_from(["sennode", "--mock"]).unwrap();
        let mut fanout = FanOut::new();
        assert!(MqttTasks::start(&args, &mut fanout).is_none());
        assert!(fanout.is_empty());

        let args = Args::try_parse_from([
            "sennode",
            "--mock",
            "--mqtt-address",
            "127.0.0.1",
            "--mqtt-port",
            "1",
        ])
        .unwrap();
        let mut fanout = FanOut::new();
        let tasks = MqttTasks::start(&args, &mut fanout).unwrap();
        assert_eq!(fanout.names(), vec!["publish"]);

        drop(fanout);
        tasks.finish().await;
    }
}
