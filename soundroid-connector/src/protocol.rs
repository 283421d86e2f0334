//! The daemon's line protocol
//!
//! Every request is one line and every reply is one line. There are no request
//! identifiers, so a reply belongs to whichever request is outstanding.

use std::fmt;

/// Highest volume the daemon reports, in percent
pub const MAX_VOLUME: u8 = 100;

/// A request line sent to the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Hello,
    GetVolume,
    /// Relative change in percent, may be negative
    ChangeVolume(i32),
    Mute,
    Unmute,
    IsMuted,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Hello => write!(f, "hello"),
            Command::GetVolume => write!(f, "get_vol"),
            Command::ChangeVolume(delta) => write!(f, "chg_vol {}", delta),
            Command::Mute => write!(f, "mute"),
            Command::Unmute => write!(f, "unmute"),
            Command::IsMuted => write!(f, "is_muted"),
        }
    }
}

/// A reply line, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing arrived in time
    Empty,
    /// `hello`
    Hello,
    /// `OK`
    Ok,
    /// `ERR`
    Err,
    /// `true` or `false`, in any case
    Flag(bool),
    /// A decimal integer
    Number(i64),
    /// Anything else
    Other(String),
}

impl Reply {
    /// Classify a reply. Surrounding whitespace is ignored; `hello`, `OK` and
    /// `ERR` must match exactly.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text {
            "" => Reply::Empty,
            "hello" => Reply::Hello,
            "OK" => Reply::Ok,
            "ERR" => Reply::Err,
            _ if text.eq_ignore_ascii_case("true") => Reply::Flag(true),
            _ if text.eq_ignore_ascii_case("false") => Reply::Flag(false),
            _ => text
                .parse()
                .map(Reply::Number)
                .unwrap_or_else(|_| Reply::Other(text.to_string())),
        }
    }
}

/// Volume percent in a `get_vol` reply, if it is one
pub fn parse_volume(text: &str) -> Option<u8> {
    match Reply::parse(text) {
        Reply::Number(n) => u8::try_from(n).ok().filter(|v| *v <= MAX_VOLUME),
        _ => None,
    }
}
