//! Replay backend: run recorded estimator output through the engine.
//!
//! The input holds one `frame` s-expression per line, in the same form
//! clients send over the socket.  Blank lines and `;` comments are
//! skipped.  Frames without `:timestamp-ms` are spaced at 30 fps.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::controller::GestureController;
use crate::ipc::dispatch::parse_frame;

/// Frame spacing for untimestamped lines.
const DEFAULT_FRAME_INTERVAL_MS: f64 = 1000.0 / 30.0;

/// Totals for one replay run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub frames: u64,
    pub skipped_lines: u64,
    pub actions: u64,
}

pub fn run(mut controller: GestureController, path: &Path) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("opening replay file {}", path.display()))?;
    info!(?path, "replaying frames");

    let stdout = std::io::stdout();
    let summary = replay(&mut controller, BufReader::new(file), stdout.lock())?;

    info!(
        "replay finished: {} frame(s), {} action(s), {} skipped line(s)",
        summary.frames, summary.actions, summary.skipped_lines
    );
    println!("{}", controller.engine.stats_sexp());
    Ok(())
}

/// Process every frame line from `input`, writing one status line per
/// frame to `out`.
pub fn replay(
    controller: &mut GestureController,
    input: impl BufRead,
    mut out: impl Write,
) -> anyhow::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (lineno, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", lineno + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }

        let parsed = lexpr::from_str(trimmed)
            .map_err(|e| e.to_string())
            .and_then(|value| parse_frame(&value));
        let (frame, timestamp_ms) = match parsed {
            Ok(p) => p,
            Err(e) => {
                warn!(line = lineno + 1, "skipping line: {}", e);
                summary.skipped_lines += 1;
                continue;
            }
        };

        let now_ms =
            timestamp_ms.unwrap_or_else(|| summary.frames as f64 * DEFAULT_FRAME_INTERVAL_MS);
        let report = controller.process_frame(&frame, now_ms);
        summary.frames += 1;
        summary.actions += report
            .outcome
            .commands()
            .iter()
            .filter(|a| !matches!(a, crate::gesture::Action::MoveCursor { .. }))
            .count() as u64;

        let gesture = report
            .outcome
            .gesture()
            .map(|g| g.as_str())
            .unwrap_or("-");
        writeln!(out, "{:>6} {:>10.1}ms  {:<11} {}", summary.frames, now_ms, gesture, report.status)?;
    }

    Ok(summary)
}
