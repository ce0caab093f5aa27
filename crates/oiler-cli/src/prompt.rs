//! Masked credential prompt.
//!
//! On a terminal, key presses are collected in raw mode and never echoed.
//! When stdin is piped, one line is read per prompt so scripts can feed
//! credentials without a TTY.

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use oiler_core::spec::SecretPrompt;

/// Prompts on stderr and reads from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl SecretPrompt for TerminalPrompt {
    fn read_secret(&self, label: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{label}")?;
        stderr.flush()?;

        let value = if io::stdin().is_terminal() {
            read_masked()
        } else {
            read_line()
        };
        writeln!(stderr)?;
        value
    }
}

/// Leaves raw mode when dropped, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn read_masked() -> io::Result<String> {
    let _guard = RawModeGuard::enter()?;
    let mut value = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        else {
            continue;
        };
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match code {
            KeyCode::Enter => return Ok(value),
            KeyCode::Char('c') if ctrl => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "input cancelled"));
            }
            KeyCode::Char('d') if ctrl && value.is_empty() => {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(c) if !ctrl => value.push(c),
            _ => {}
        }
    }
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stdin closed before a value was entered",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
