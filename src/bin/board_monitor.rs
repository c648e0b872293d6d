//! Board monitor
//!
//! Connects to a Firmata board over any transport and logs every board
//! event until interrupted.
//!
//! ```text
//! board-monitor --mqtt 10Q28gEP
//! board-monitor --serial /dev/ttyACM0 --capabilities
//! board-monitor --config board.json
//! RUST_LOG=firmata_board=debug board-monitor --websocket 192.168.1.20
//! ```

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use firmata_board::board::{Arduino, Area, WebArduino};
use firmata_board::{
    AnyTransport, Board, BoardConfig, BoardEvent, Handshake, StandardHandshake, TransportConfig,
    WebSocketTransportConfig,
};

/// Log events from a Firmata board.
#[derive(Debug, Parser)]
#[command(name = "board-monitor", version)]
struct Args {
    /// JSON board configuration file.
    #[arg(long, conflicts_with_all = ["mqtt", "serial", "bluetooth", "websocket"])]
    config: Option<PathBuf>,

    /// Webduino device id on the MQTT relay.
    #[arg(long)]
    mqtt: Option<String>,

    /// Use the China relay for --mqtt.
    #[arg(long, requires = "mqtt")]
    china: bool,

    /// Custom relay server for --mqtt.
    #[arg(long, requires = "mqtt")]
    server: Option<String>,

    /// Serial device path.
    #[arg(long)]
    serial: Option<String>,

    /// Serial baud rate.
    #[arg(long, default_value_t = 57600)]
    baud: u32,

    /// RFCOMM device for a Bluetooth board.
    #[arg(long)]
    bluetooth: Option<String>,

    /// WebSocket endpoint.
    #[arg(long)]
    websocket: Option<String>,

    /// Reopen the transport after an unexpected close.
    #[arg(long)]
    auto_reconnect: bool,

    /// Analog sampling interval in milliseconds, sent once ready.
    #[arg(long)]
    sampling_interval: Option<u32>,

    /// Log the capability table once ready.
    #[arg(long)]
    capabilities: bool,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let (mut config, handshake) = board_config(&args)?;
    if args.auto_reconnect {
        config = config.with_auto_reconnect(true);
    }
    if let Some(ms) = args.sampling_interval {
        config = config.with_sampling_interval_ms(ms);
    }

    let mut board = Board::<AnyTransport>::connect(config, handshake).context("failed to open transport")?;
    tracing::info!(handshake = board.handshake_name(), "connecting");
    let events = board.subscribe();

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        board.poll();
        for event in events.try_iter() {
            log_event(&event);
            if event == BoardEvent::Ready && args.capabilities {
                board.report_capabilities();
            }
            if event == BoardEvent::Disconnect && !board.config().auto_reconnect {
                tracing::info!("board disconnected, exiting");
                return Ok(());
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            board.disconnect();
            board.poll();
            return Ok(());
        }
        thread::sleep(Duration::from_millis(10));
    }
}

fn board_config(args: &Args) -> Result<(BoardConfig, Box<dyn Handshake>)> {
    if let Some(path) = &args.config {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: BoardConfig =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let handshake: Box<dyn Handshake> = match &config.transport {
            Some(TransportConfig::Mqtt(_)) => Box::new(WebArduino::handshake()),
            _ => Arduino::handshake_for(&config),
        };
        return Ok((config, handshake));
    }
    if let Some(device) = &args.mqtt {
        let config = match (&args.server, args.china) {
            (Some(server), _) => WebArduino::config_with_server(device, server),
            (None, true) => WebArduino::config_in(device, Area::China),
            (None, false) => WebArduino::config(device),
        };
        return Ok((config, Box::new(WebArduino::handshake())));
    }
    if let Some(path) = &args.serial {
        let mut config = Arduino::serial_config(path);
        if let Some(TransportConfig::Serial(serial)) = config.transport.as_mut() {
            serial.baud_rate = args.baud;
        }
        let handshake = Arduino::handshake_for(&config);
        return Ok((config, handshake));
    }
    if let Some(address) = &args.bluetooth {
        let config = Arduino::bluetooth_config(address);
        let handshake = Arduino::handshake_for(&config);
        return Ok((config, handshake));
    }
    if let Some(url) = &args.websocket {
        let ws = WebSocketTransportConfig::default().with_url(url);
        let config = BoardConfig::default().with_transport(TransportConfig::WebSocket(ws));
        return Ok((config, Box::new(StandardHandshake)));
    }
    bail!("no transport given; use --config, --mqtt, --serial, --bluetooth or --websocket")
}

fn log_event(event: &BoardEvent) {
    match event {
        BoardEvent::Ready => tracing::info!("ready"),
        BoardEvent::Error(err) => tracing::error!(error = %err, "board error"),
        BoardEvent::BeforeDisconnect => tracing::info!("disconnecting"),
        BoardEvent::Disconnect => tracing::warn!("disconnected"),
        BoardEvent::Reconnect => tracing::info!("reconnected"),
        BoardEvent::DigitalData { pin, value } => tracing::info!(pin, value, "digital"),
        BoardEvent::AnalogData { pin, channel, value } => tracing::info!(pin, channel, value, "analog"),
        BoardEvent::FirmwareName { name, version } => tracing::info!(%name, %version, "firmware"),
        BoardEvent::FirmwareVersion(version) => tracing::info!(%version, "protocol version"),
        BoardEvent::StringMessage(s) => tracing::info!(message = %s, "string"),
        BoardEvent::SysexMessage(bytes) => tracing::info!(?bytes, "sysex"),
        BoardEvent::PinStateResponse(report) => {
            tracing::info!(pin = report.pin, mode = ?report.mode, state = report.state, "pin state")
        }
    }
}
