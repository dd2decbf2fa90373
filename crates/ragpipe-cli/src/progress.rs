//! Stage progress on stderr

use ragpipe_core::ProgressSnapshot;
use std::io::{self, Write};

/// Single-line progress reporter; redraws in place
pub struct ProgressReporter {
    visible: bool,
    last: Option<ProgressSnapshot>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            visible: false,
            last: None,
        }
    }

    pub fn show(&mut self, snapshot: &ProgressSnapshot) {
        if self.last.as_ref() == Some(snapshot) {
            return;
        }
        self.set_message(&render(snapshot));
        self.last = Some(snapshot.clone());
    }

    pub fn set_message(&mut self, msg: &str) {
        eprint!("\r{:<50}", msg);
        io::stderr().flush().ok();
        self.visible = true;
    }

    /// Blank the line so stdout output starts clean
    pub fn finish(&mut self) {
        if self.visible {
            eprint!("\r{:<50}\r", "");
            io::stderr().flush().ok();
            self.visible = false;
        }
        self.last = None;
    }
}

fn render(snapshot: &ProgressSnapshot) -> String {
    match snapshot.fraction() {
        Some(fraction) => format!(
            "{} ({}/{}, {:.0}%)",
            snapshot.stage,
            snapshot.current,
            snapshot.total,
            fraction * 100.0
        ),
        None if snapshot.current > 0 => format!("{} ({})", snapshot.stage, snapshot.current),
        None => format!("{}...", snapshot.stage),
    }
}
