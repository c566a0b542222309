//! senlib - leitura de sensores ambientais I2C pela linha de comando
//!
//! Resolve o driver pelo nome, abre `/dev/i2c-<bus>` e imprime cada
//! medição em txt, json ou xml. `-p` sem valor lê até Ctrl-C.

use clap::Parser;
use colored::*;
use sen_core::bus::BoxedBus;
use sen_core::config::{DEFAULT_BUS, DEFAULT_INTERVAL_SECS, DEFAULT_SENSOR};
use sen_core::{
    AcquisitionConfig, Address, DriverRegistry, FanOut, OutputFormat, PrintSink, Scheduler,
    SenResult, parse_address,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "senlib")]
#[command(author = "SIL Contributors")]
#[command(version = "2026.1.16")]
#[command(about = "Poll I2C environmental sensors", long_about = None)]
struct Cli {
    /// Sensor driver name (default: bme280)
    #[arg(value_name = "SENSOR")]
    sensor: Option<String>,

    /// Use the simulated sensor instead of the I2C bus
    #[arg(long)]
    mock: bool,

    /// Device address (e.g. 0x76); defaults to the driver's address
    #[arg(short, long, value_parser = address_arg)]
    address: Option<Address>,

    /// I2C bus number (default: 1)
    #[arg(short, long, env = "SENLIB_BUS")]
    bus: Option<u8>,

    /// Number of measurements; without a value, poll until interrupted
    #[arg(short, long, value_name = "N", num_args = 0..=1)]
    poll: Option<Option<u32>>,

    /// Seconds between measurements (default: 2)
    #[arg(short, long)]
    interval: Option<f64>,

    /// Output format
    #[arg(short, long, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Indent json/xml output
    #[arg(long)]
    pretty_print: bool,

    /// Read settings from a TOML file; flags take precedence
    #[arg(short, long, value_name = "FILE", env = "SENLIB_CONFIG")]
    config: Option<PathBuf>,

    /// List available sensor drivers and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn address_arg(s: &str) -> Result<Address, String> {
    parse_address(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// RUST_LOG tem precedência sobre `-d`
fn init_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(debug).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "senlib=debug,sen_core=debug"
    } else {
        "senlib=info,sen_core=info"
    }
}

/// Nome impresso nos relatórios: o sensor pedido, mesmo com `--mock`
fn report_name(config: &AcquisitionConfig) -> String {
    config.sensor.to_lowercase()
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let registry = DriverRegistry::with_builtin();
    if cli.list {
        list_command(&registry);
        return Ok(());
    }

    let config = acquisition_config(&cli)?;
    let schedule = config.validate()?;
    let driver = registry.from_config(&config, open_bus)?;

    let fanout = FanOut::new().with_sink(PrintSink::stdout(
        report_name(&config),
        cli.format,
        cli.pretty_print,
    ));
    let mut scheduler = Scheduler::new(driver, fanout, schedule);

    let stop = scheduler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            stop.stop();
        }
    });

    let stats = scheduler.run().await?;
    if stats.cycles > 0 && stats.delivered == 0 {
        anyhow::bail!(
            "no measurement acquired: {}",
            stats.last_error.unwrap_or_else(|| "unknown error".into())
        );
    }
    Ok(())
}

/// Mescla arquivo de configuração e flags
///
/// Sem arquivo, uma única leitura é feita (`-p` altera).
fn acquisition_config(cli: &Cli) -> SenResult<AcquisitionConfig> {
    let mut config = match &cli.config {
        Some(path) => AcquisitionConfig::from_file(path)?,
        None => AcquisitionConfig {
            cycles: Some(1),
            ..AcquisitionConfig::default()
        },
    };

    if let Some(sensor) = &cli.sensor {
        config.sensor = sensor.clone();
    }
    if cli.mock {
        config.mock = true;
    }
    if let Some(address) = cli.address {
        config.address = Some(address);
    }
    if let Some(bus) = cli.bus {
        config.bus = bus;
    }
    if let Some(interval) = cli.interval {
        config.interval = interval;
    }
    if let Some(poll) = cli.poll {
        config.cycles = poll;
    }
    Ok(config)
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

fn list_command(registry: &DriverRegistry) {
    println!("{}", "Available sensors:".bold());
    for descriptor in registry.descriptors() {
        let quantities: Vec<&str> = descriptor.quantities.iter().map(|q| q.name()).collect();
        println!(
            "  {} {:#04x}  {:<30} {}",
            format!("{:<12}", descriptor.name).cyan(),
            descriptor.default_address,
            quantities.join(", "),
            descriptor.description.dimmed()
        );
    }
    println!();
    println!(
        "Defaults: sensor {}, bus {}, interval {}s",
        DEFAULT_SENSOR, DEFAULT_BUS, DEFAULT_INTERVAL_SECS
    );
}
