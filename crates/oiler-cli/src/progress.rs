//! `[n/m]` step lines on stderr.
//!
//! Shown only when stderr is a terminal, so piped output and scripts stay
//! clean.

use std::io::{self, IsTerminal, Write};

/// Numbered progress for one command.
pub struct Steps<W> {
    out: Option<W>,
    total: usize,
    current: usize,
}

impl Steps<io::Stderr> {
    /// Steps on stderr, silent unless stderr is a terminal.
    pub fn stderr(total: usize) -> Self {
        let stderr = io::stderr();
        let out = stderr.is_terminal().then_some(stderr);
        Self::new(out, total)
    }
}

impl<W: Write> Steps<W> {
    pub fn new(out: Option<W>, total: usize) -> Self {
        Self {
            out,
            total,
            current: 0,
        }
    }

    /// Announce the next step.
    pub fn step(&mut self, label: &str) {
        self.current = (self.current + 1).min(self.total);
        if let Some(out) = self.out.as_mut() {
            // Progress output is best-effort.
            let _ = writeln!(out, "[{}/{}] {label}...", self.current, self.total);
            let _ = out.flush();
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> Option<W> {
        self.out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numbers_each_step() {
        let mut steps = Steps::new(Some(Vec::new()), 3);
        steps.step("Preparing");
        steps.step("Getting BackupRequests");
        steps.step("Generating results");
        let written = String::from_utf8(steps.into_inner().unwrap()).unwrap();
        assert_eq!(
            written,
            "[1/3] Preparing...\n[2/3] Getting BackupRequests...\n[3/3] Generating results...\n"
        );
    }

    #[test]
    fn never_counts_past_total() {
        let mut steps = Steps::new(Some(Vec::new()), 1);
        steps.step("a");
        steps.step("b");
        let written = String::from_utf8(steps.into_inner().unwrap()).unwrap();
        assert!(written.ends_with("[1/1] b...\n"));
    }

    #[test]
    fn silent_without_writer() {
        let mut steps: Steps<Vec<u8>> = Steps::new(None, 2);
        steps.step("Preparing");
        assert!(steps.into_inner().is_none());
    }
}
