//! Socket backend: the daemon mode.
//!
//! Listens on the IPC socket for estimator frames and client queries,
//! processes the newest queued frame each loop iteration, handles
//! SIGTERM/SIGINT gracefully and logs a periodic status line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use calloop::EventLoop;
use tracing::info;

use super::IpcConfig;
use crate::controller::GestureController;
use crate::ipc;
use crate::state::PilotState;

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Socket backend configuration.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Poll interval in milliseconds.  Bounds frame latency.
    pub poll_interval_ms: u64,
    /// Exit after N seconds.
    pub exit_after: Option<u64>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            exit_after: None,
        }
    }
}

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
fn install_signal_handlers() {
    let handler: extern "C" fn(libc::c_int) = signal_handler;
    unsafe {
        libc::signal(libc::SIGTERM, handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn run(
    controller: GestureController,
    ipc_config: IpcConfig,
    config: SocketConfig,
) -> anyhow::Result<()> {
    let mut event_loop = EventLoop::<PilotState>::try_new()?;
    let mut state = PilotState::new(controller);

    state.ipc_server.ipc_trace = ipc_config.trace;
    let ipc_path = ipc_config
        .socket_path
        .unwrap_or_else(ipc::IpcServer::default_socket_path);
    state.ipc_server.socket_path = ipc_path.clone();
    ipc::IpcServer::bind(&ipc_path, &event_loop.handle())?;

    install_signal_handlers();

    let start_time = Instant::now();
    let exit_duration = config.exit_after.map(Duration::from_secs);
    let mut last_status_log = Instant::now();
    let status_interval = Duration::from_secs(60);

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    info!(
        "socket backend ready (poll interval: {}ms), entering event loop",
        config.poll_interval_ms
    );

    while state.running {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown signal received, exiting");
            state.running = false;
            break;
        }

        if let Some(dur) = exit_duration {
            if start_time.elapsed() >= dur {
                info!("exit timer fired after {}s", dur.as_secs());
                state.running = false;
                break;
            }
        }

        if last_status_log.elapsed() >= status_interval {
            let stats = state.controller.engine.stats();
            info!(
                "status: {} frame(s), {} dropped, {} IPC client(s), last: {}",
                stats.frames,
                state.frame_slot.dropped(),
                state.ipc_server.clients.len(),
                state
                    .controller
                    .last_report()
                    .map(|r| r.status.as_str())
                    .unwrap_or("No Hand Detected"),
            );
            last_status_log = Instant::now();
        }

        ipc::IpcServer::poll_clients(&mut state);
        if state.process_pending_frame().is_some() {
            // Flush the gesture-frame event now rather than next iteration.
            ipc::IpcServer::poll_clients(&mut state);
        }

        event_loop.dispatch(Some(poll_interval), &mut state)?;
    }

    let _ = std::fs::remove_file(&state.ipc_server.socket_path);

    info!(
        "socket backend shutting down ({} frame(s), {} IPC client(s))",
        state.controller.engine.stats().frames,
        state.ipc_server.clients.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigterm_requests_shutdown() {
        install_signal_handlers();
        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
        let rc = unsafe { libc::raise(libc::SIGTERM) };
        assert_eq!(rc, 0);
        assert!(SHUTDOWN_REQUESTED.load(Ordering::SeqCst));
        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_default_config() {
        let config = SocketConfig::default();
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.exit_after, None);
    }
}
