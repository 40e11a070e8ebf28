//! Backends: where frames come from.

pub mod replay;
pub mod socket;

use std::path::PathBuf;

use crate::controller::GestureController;

pub use socket::SocketConfig;

/// Backend selector.
#[derive(Debug, Clone)]
pub enum BackendType {
    /// Serve the IPC socket and process frames from clients.
    Socket,
    /// Process a recorded frame file and exit.
    Replay(PathBuf),
}

/// IPC socket configuration.
#[derive(Debug, Clone, Default)]
pub struct IpcConfig {
    pub socket_path: Option<PathBuf>,
    pub trace: bool,
}

/// Parse a "WxH" resolution string.
pub fn parse_resolution(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    let w = w.trim().parse::<u32>().ok()?;
    let h = h.trim().parse::<u32>().ok()?;
    if w > 0 && h > 0 {
        Some((w, h))
    } else {
        None
    }
}

/// Run the selected backend to completion.
pub fn run(
    backend: BackendType,
    controller: GestureController,
    ipc_config: IpcConfig,
    socket_config: SocketConfig,
) -> anyhow::Result<()> {
    match backend {
        BackendType::Socket => socket::run(controller, ipc_config, socket_config),
        BackendType::Replay(path) => replay::run(controller, &path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080"), Some((1920, 1080)));
        assert_eq!(parse_resolution("2560x1440"), Some((2560, 1440)));
        assert_eq!(parse_resolution("0x1080"), None);
        assert_eq!(parse_resolution("1920"), None);
        assert_eq!(parse_resolution("1920x1080x2"), None);
        assert_eq!(parse_resolution("widexhigh"), None);
    }
}
