//! Masked password entry

use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptState {
    Editing,
    Submitted,
    Cancelled,
}

/// Prints `prompt` to stderr and reads a line without echoing it.
///
/// When stdin is not a terminal the line is read as-is, so the password can
/// be piped in from a secrets manager.
pub fn read_masked(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;

    if !io::stdin().is_terminal() {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        writeln!(stderr)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    terminal::enable_raw_mode()?;
    let entered = read_until_submitted();
    let restored = terminal::disable_raw_mode();
    writeln!(stderr)?;

    let secret = entered?;
    restored?;
    Ok(secret)
}

fn read_until_submitted() -> io::Result<String> {
    let mut secret = String::new();
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        match apply_key(&mut secret, key) {
            PromptState::Editing => {}
            PromptState::Submitted => return Ok(secret),
            PromptState::Cancelled => {
                return Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "password entry cancelled",
                ))
            }
        }
    }
}

fn apply_key(secret: &mut String, key: KeyEvent) -> PromptState {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
    {
        return PromptState::Cancelled;
    }

    match key.code {
        KeyCode::Enter => PromptState::Submitted,
        KeyCode::Esc => PromptState::Cancelled,
        KeyCode::Backspace => {
            secret.pop();
            PromptState::Editing
        }
        KeyCode::Char(character) => {
            secret.push(character);
            PromptState::Editing
        }
        _ => PromptState::Editing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn collects_characters_until_enter() {
        let mut secret = String::new();
        for character in "pa$s".chars() {
            assert_eq!(apply_key(&mut secret, key(KeyCode::Char(character))), PromptState::Editing);
        }
        assert_eq!(apply_key(&mut secret, key(KeyCode::Backspace)), PromptState::Editing);
        assert_eq!(apply_key(&mut secret, key(KeyCode::Enter)), PromptState::Submitted);
        assert_eq!(secret, "pa$");
    }

    #[test]
    fn control_c_and_escape_cancel() {
        let mut secret = String::new();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(apply_key(&mut secret, ctrl_c), PromptState::Cancelled);
        assert_eq!(apply_key(&mut secret, key(KeyCode::Esc)), PromptState::Cancelled);
        assert!(secret.is_empty());
    }

    #[test]
    fn navigation_keys_are_ignored() {
        let mut secret = "abc".to_string();
        assert_eq!(apply_key(&mut secret, key(KeyCode::Left)), PromptState::Editing);
        assert_eq!(secret, "abc");
    }
}
