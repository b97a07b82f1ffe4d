//! Operator commands
//!
//! | text                                | command                        |
//! |-------------------------------------|--------------------------------|
//! | `run`                               | [`Command::Run`]               |
//! | `halt`                              | [`Command::Halt`]              |
//! | `reinitialize`                      | [`Command::Reinitialize`]      |
//! | `clear normal\|direction\|speed\|all` | [`Command::Clear`]           |
//! | `aligntosource`                     | [`Command::AlignToSource`]     |
//! | `debug`                             | [`Command::Debug`]             |

use core::fmt;
use core::str::FromStr;

use crate::error::ParseError;
use crate::types::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start (or restart) the routine the model calls for
    Run,
    /// Stop every routine and actuator
    Halt,
    /// Forget the whole model and start over
    Reinitialize,
    /// Forget one field, or all of them with `None`
    Clear(Option<Field>),
    /// Point the sensor at the source once, without tracking
    AlignToSource,
    /// Report status
    Debug,
}

impl FromStr for Command {
    type Err = ParseError;

    /// # Example
    /// ```
    /// use helio_seek::{Command, Field};
    ///
    /// assert_eq!("clear speed".parse::<Command>().unwrap(), Command::Clear(Some(Field::AngularSpeed)));
    /// assert_eq!("Clear ALL".parse::<Command>().unwrap(), Command::Clear(None));
    /// assert!("clear".parse::<Command>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Command(s.to_string()));
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "run" | "start" => Command::Run,
            "halt" | "stop" => Command::Halt,
            "reinitialize" | "reinit" => Command::Reinitialize,
            "aligntosource" | "align" => Command::AlignToSource,
            "debug" | "status" => Command::Debug,
            "clear" => {
                let Some(target) = words.next() else {
                    return Err(ParseError::MissingArgument("clear".to_string()));
                };
                if target.eq_ignore_ascii_case("all") {
                    Command::Clear(None)
                } else {
                    Command::Clear(Some(target.parse()?))
                }
            }
            _ => return Err(ParseError::Command(s.to_string())),
        };

        if words.next().is_some() {
            return Err(ParseError::Command(s.to_string()));
        }
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Run => f.write_str("run"),
            Command::Halt => f.write_str("halt"),
            Command::Reinitialize => f.write_str("reinitialize"),
            Command::Clear(Some(field)) => write!(f, "clear {field}"),
            Command::Clear(None) => f.write_str("clear all"),
            Command::AlignToSource => f.write_str("aligntosource"),
            Command::Debug => f.write_str("debug"),
        }
    }
}
