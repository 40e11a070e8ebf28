//! Volume and brightness through command-line tools.
//!
//! `wpctl` (PipeWire) sets the default sink volume and `brightnessctl`
//! sets the backlight.  Both are located on `PATH` once at start; a
//! missing tool means the capability is reported as absent.

use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::SinkError;

const WPCTL: &str = "wpctl";
const BRIGHTNESSCTL: &str = "brightnessctl";

/// Resolved tool paths.
#[derive(Debug, Clone, Default)]
pub struct SystemControls {
    wpctl: Option<PathBuf>,
    brightnessctl: Option<PathBuf>,
}

impl SystemControls {
    /// Probe the process `PATH`.
    pub fn probe() -> Self {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let controls = Self::from_path_var(&path);
        info!(
            volume = controls.has_volume(),
            brightness = controls.has_brightness(),
            "system controls probed"
        );
        controls
    }

    /// Probe an explicit `PATH`-style search list.
    pub fn from_path_var(path: &OsStr) -> Self {
        Self {
            wpctl: find_executable(path, WPCTL),
            brightnessctl: find_executable(path, BRIGHTNESSCTL),
        }
    }

    pub fn has_volume(&self) -> bool {
        self.wpctl.is_some()
    }

    pub fn has_brightness(&self) -> bool {
        self.brightnessctl.is_some()
    }

    /// Set the default audio sink volume, `level` in [0, 1].
    pub fn set_volume(&self, level: f32) -> Result<(), SinkError> {
        let program = self
            .wpctl
            .as_deref()
            .ok_or(SinkError::Unsupported("set-volume"))?;
        run(program, &volume_args(level))
    }

    /// Set backlight brightness in percent.
    pub fn set_brightness(&self, percent: u8) -> Result<(), SinkError> {
        let program = self
            .brightnessctl
            .as_deref()
            .ok_or(SinkError::Unsupported("set-brightness"))?;
        run(program, &brightness_args(percent))
    }
}

pub fn volume_args(level: f32) -> Vec<String> {
    vec![
        "set-volume".to_string(),
        "@DEFAULT_AUDIO_SINK@".to_string(),
        format!("{:.2}", level.clamp(0.0, 1.0)),
    ]
}

pub fn brightness_args(percent: u8) -> Vec<String> {
    vec![
        "--quiet".to_string(),
        "set".to_string(),
        format!("{}%", percent.min(100)),
    ]
}

fn find_executable(path: &OsStr, name: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn run(program: &Path, args: &[String]) -> Result<(), SinkError> {
    debug!(program = %program.display(), ?args, "running system control");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| SinkError::Backend(format!("{}: {}", program.display(), e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(SinkError::Backend(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim(),
        )))
    }
}
