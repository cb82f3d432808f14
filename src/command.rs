//! Host commands
//!
//! Commands arrive as deframed ASCII text. The first byte selects the command, any arguments
//! follow separated by whitespace. A trailing NUL terminator is accepted.
//!
//! | Command | Arguments | Action |
//! |---------|-----------|--------|
//! | `V` | | Report the firmware version |
//! | `S` | `duration_ms gain f_start f_stop f_return` | Configure and start |
//! | `X` | | Stop |
//! | `A` | | Enable the transmit trigger |
//! | `L` | | Disable the transmit trigger |
use core::str::FromStr;

use crate::settings::WaveformRequest;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
    Version,
    Start(WaveformRequest),
    Stop,
    TransmitOn,
    TransmitOff,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command {0:#04x}")]
    Unknown(u8),
    #[error("Command is not ASCII text")]
    Encoding,
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Invalid {0}")]
    Invalid(&'static str),
    #[error("Unexpected trailing arguments")]
    Trailing,
}

impl CommandError {
    /// The status code reported to the host.
    pub fn code(&self) -> i16 {
        match self {
            CommandError::Empty | CommandError::Unknown(_) => -10,
            _ => -11,
        }
    }
}

fn field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, CommandError> {
    fields
        .next()
        .ok_or(CommandError::Missing(name))?
        .parse()
        .map_err(|_| CommandError::Invalid(name))
}

impl Command {
    /// Parse a deframed command.
    pub fn parse(frame: &[u8]) -> Result<Self, CommandError> {
        let (&op, args) = frame.split_first().ok_or(CommandError::Empty)?;
        let args = core::str::from_utf8(args).map_err(|_| CommandError::Encoding)?;
        let mut fields = args.trim_end_matches('\0').split_ascii_whitespace();

        let command = match op {
            b'V' => Command::Version,
            b'S' => Command::Start(WaveformRequest {
                duration_ms: field(&mut fields, "duration")?,
                gain: field(&mut fields, "gain")?,
                freq_start: field(&mut fields, "start frequency")?,
                freq_stop: field(&mut fields, "stop frequency")?,
                freq_return: field(&mut fields, "return frequency")?,
            }),
            b'X' => Command::Stop,
            b'A' => Command::TransmitOn,
            b'L' => Command::TransmitOff,
            other => return Err(CommandError::Unknown(other)),
        };

        if fields.next().is_some() {
            return Err(CommandError::Trailing);
        }
        Ok(command)
    }
}
