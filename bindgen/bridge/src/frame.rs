//! The per-frame driver: `init` once, then `update` until the window closes.

use crate::namespace::{Global, Interpreter};
use raybridge_common::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// `update` calls made, including ones that failed.
    pub frames: u64,
    /// Calls that raised an error. Each only aborted its own frame.
    pub errors: u64,
    /// True if the loop stopped because `WindowShouldClose` said so.
    pub closed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameLoop {
    limit: u64,
}

impl FrameLoop {
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    /// Frames never overlap: each `update` returns before the next starts.
    ///
    /// Setup-class errors (a missing binding, a bad API) stop the loop;
    /// call errors are logged and the next frame runs.
    pub fn run(&self, interpreter: &mut dyn Interpreter) -> Result<FrameReport, BridgeError> {
        let mut report = FrameReport::default();

        if let Err(err) = interpreter.call_entry("init") {
            Self::absorb(err, "init", &mut report)?;
        }

        while report.frames < self.limit {
            match should_close(interpreter) {
                Ok(true) => {
                    report.closed = true;
                    break;
                }
                Ok(false) => {}
                Err(err) => Self::absorb(err, "WindowShouldClose", &mut report)?,
            }
            report.frames += 1;
            match interpreter.call_entry("update") {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!("no update entry point; stopping");
                    report.frames -= 1;
                    break;
                }
                Err(err) => Self::absorb(err, "update", &mut report)?,
            }
        }

        tracing::info!(frames = report.frames, errors = report.errors, "frame loop finished");
        Ok(report)
    }

    fn absorb(err: BridgeError, entry: &str, report: &mut FrameReport) -> Result<(), BridgeError> {
        if err.is_setup_error() {
            return Err(err);
        }
        tracing::warn!(entry, frame = report.frames, error = %err, "call failed");
        report.errors += 1;
        Ok(())
    }
}

fn should_close(interpreter: &dyn Interpreter) -> Result<bool, BridgeError> {
    match interpreter.get_global("WindowShouldClose") {
        Some(Global::Function(f)) => Ok(f.call(&[])?.is_truthy()),
        _ => Ok(false),
    }
}
