//! Line-oriented operator console for the headless viewer.
//!
//! Each stdin line is one command.  Coordinates are local window units, the
//! same space a GUI would report pointer positions in.
//!
//! ```text
//! move <x> <y>                 pointer move
//! down <x> <y> [button]        button press (left | right | middle)
//! up <x> <y> [button]          button release
//! click <x> <y> [button]       press + release
//! wheel <delta>                wheel, 120 per notch, negative = down
//! key <name>                   key press + release, e.g. `key Enter`
//! text <anything…>             type the rest of the line
//! fit                          fit canvas to the viewport
//! quit | exit                  close the session
//! ```

use remote_core::{ModifierFlags, MouseButton};
use thiserror::Error;

use crate::domain::LocalInput;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Input(Vec<LocalInput>),
    Fit,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("'{0}' is not a number")]
    InvalidNumber(String),

    #[error("unknown button '{0}'")]
    InvalidButton(String),
}

/// Parses one console line.  Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word {
        "move" => {
            let (x, y) = point("move", &args)?;
            ConsoleCommand::Input(vec![LocalInput::PointerMove { x, y }])
        }
        "down" => {
            let (x, y) = point("down", &args)?;
            let button = button(args.get(2))?;
            ConsoleCommand::Input(vec![LocalInput::PointerDown { x, y, button }])
        }
        "up" => {
            let (x, y) = point("up", &args)?;
            let button = button(args.get(2))?;
            ConsoleCommand::Input(vec![LocalInput::PointerUp { x, y, button }])
        }
        "click" => {
            let (x, y) = point("click", &args)?;
            let button = button(args.get(2))?;
            ConsoleCommand::Input(vec![
                LocalInput::PointerDown { x, y, button },
                LocalInput::PointerUp { x, y, button },
            ])
        }
        "wheel" => {
            let raw = args.first().ok_or(ConsoleError::MissingArgument {
                command: "wheel",
                expected: "a delta",
            })?;
            let delta = raw
                .parse()
                .map_err(|_| ConsoleError::InvalidNumber((*raw).to_string()))?;
            ConsoleCommand::Input(vec![LocalInput::Wheel { delta }])
        }
        "key" => {
            let name = args.first().ok_or(ConsoleError::MissingArgument {
                command: "key",
                expected: "a key name",
            })?;
            let modifiers = ModifierFlags::default();
            ConsoleCommand::Input(vec![
                LocalInput::KeyDown { key: (*name).to_string(), modifiers },
                LocalInput::KeyUp { key: (*name).to_string(), modifiers },
            ])
        }
        "text" => {
            if rest.is_empty() {
                return Err(ConsoleError::MissingArgument {
                    command: "text",
                    expected: "some text",
                });
            }
            ConsoleCommand::Input(vec![LocalInput::Text(rest.to_string())])
        }
        "fit" => ConsoleCommand::Fit,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

fn point(command: &'static str, args: &[&str]) -> Result<(f64, f64), ConsoleError> {
    let (Some(x), Some(y)) = (args.first(), args.get(1)) else {
        return Err(ConsoleError::MissingArgument {
            command,
            expected: "x and y",
        });
    };
    Ok((number(x)?, number(y)?))
}

fn number(raw: &str) -> Result<f64, ConsoleError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleError::InvalidNumber(raw.to_string()))
}

fn button(raw: Option<&&str>) -> Result<MouseButton, ConsoleError> {
    match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("left") => Ok(MouseButton::Left),
        Some("right") => Ok(MouseButton::Right),
        Some("middle") => Ok(MouseButton::Middle),
        Some(other) => Err(ConsoleError::InvalidButton(other.to_string())),
    }
}
