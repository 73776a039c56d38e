//! Text commands standing in for the template's buttons.

use std::io;

use messenger::DispatchError;
use shared::{
    domain::{Direction, ModelField},
    protocol::ChangeRequest,
};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  click          press the regular button
  toggle         press the toggle button
  up <1|2>       increment variable1 or variable2
  down <1|2>     decrement variable1 or variable2
  help           show this text
  quit           leave";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    Click,
    Toggle,
    Change(ChangeRequest),
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
    #[error("invalid argument for '{command}': {argument:?}")]
    InvalidArgument { command: String, argument: String },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("failed to write view output")]
    Io(#[from] io::Error),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ViewCommand>, ViewError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let head = head.to_ascii_lowercase();
    let argument = words.collect::<Vec<_>>().join(" ");

    let command = match head.as_str() {
        "click" => ViewCommand::Click,
        "toggle" => ViewCommand::Toggle,
        "help" | "?" => ViewCommand::Help,
        "quit" | "exit" => ViewCommand::Quit,
        "up" | "down" => {
            let field = ModelField::parse(&argument).ok_or_else(|| ViewError::InvalidArgument {
                command: head.clone(),
                argument: argument.clone(),
            })?;
            let direction = if head == "up" {
                Direction::Up
            } else {
                Direction::Down
            };
            ViewCommand::Change(ChangeRequest { field, direction })
        }
        _ => return Err(ViewError::UnknownCommand(head)),
    };

    Ok(Some(command))
}
