//! handpilot - hand gesture desktop control
//!
//! Turns 21-point hand landmark frames from an external estimator into
//! pointer, scroll, media, volume and brightness actions.

mod backend;
mod controller;
pub mod gesture;
pub mod ipc;
pub mod sink;
mod state;

use clap::Parser;
use tracing::info;

use crate::gesture::continuous::PinchTarget;
use crate::gesture::predicates::CameraOrientation;
use crate::gesture::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "handpilot", about = "Hand gesture desktop control")]
struct Cli {
    /// Backend to use: socket, replay, or auto
    #[arg(long, default_value = "auto")]
    backend: String,

    /// IPC socket path (default: $XDG_RUNTIME_DIR/handpilot.sock)
    #[arg(long)]
    socket: Option<String>,

    /// Log all IPC messages
    #[arg(long)]
    ipc_trace: bool,

    /// Frame file for the replay backend
    #[arg(long)]
    replay: Option<String>,

    /// Screen size as WxH (default: from the sink, else 1920x1080)
    #[arg(long)]
    screen: Option<String>,

    /// Camera image orientation: mirrored or direct
    #[arg(long, default_value = "mirrored")]
    camera: String,

    /// What a held pinch controls: volume or brightness
    #[arg(long, default_value = "volume")]
    pinch_target: String,

    /// Classify and report, but perform no OS actions
    #[arg(long)]
    dry_run: bool,

    /// Exit after N seconds (socket backend)
    #[arg(long)]
    exit_after: Option<u64>,

    /// Event loop poll interval in milliseconds (socket backend)
    #[arg(long, default_value_t = 5)]
    poll_interval_ms: u64,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("handpilot {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handpilot=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("handpilot v{} starting", env!("CARGO_PKG_VERSION"));

    let backend_type = match (cli.backend.as_str(), cli.replay.as_ref()) {
        ("socket", _) | ("auto", None) => backend::BackendType::Socket,
        ("replay", Some(path)) | ("auto", Some(path)) => {
            backend::BackendType::Replay(std::path::PathBuf::from(path))
        }
        ("replay", None) => anyhow::bail!("--backend replay needs --replay FILE"),
        (other, _) => anyhow::bail!("unknown backend: {other}. Use: socket, replay, or auto"),
    };
    info!("backend: {:?}", backend_type);

    let mut config = EngineConfig::default();
    config.classifier.orientation = CameraOrientation::parse(&cli.camera).ok_or_else(|| {
        anyhow::anyhow!("unknown camera orientation: {}. Use: mirrored or direct", cli.camera)
    })?;
    config.continuous.pinch_target = PinchTarget::parse(&cli.pinch_target).ok_or_else(|| {
        anyhow::anyhow!("unknown pinch target: {}. Use: volume or brightness", cli.pinch_target)
    })?;

    let screen = cli
        .screen
        .as_deref()
        .map(|s| {
            backend::parse_resolution(s)
                .ok_or_else(|| anyhow::anyhow!("invalid --screen {s}, expected WxH"))
        })
        .transpose()?;

    let sink = sink::create_sink(cli.dry_run);
    let controller = controller::GestureController::new(config, sink, screen);

    let ipc_config = backend::IpcConfig {
        socket_path: cli.socket.map(std::path::PathBuf::from),
        trace: cli.ipc_trace,
    };
    let socket_config = backend::SocketConfig {
        poll_interval_ms: cli.poll_interval_ms.max(1),
        exit_after: cli.exit_after,
    };

    backend::run(backend_type, controller, ipc_config, socket_config)
}
