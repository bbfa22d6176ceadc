//! Inbound line classification.
//!
//! The remote peer speaks in delimiter-terminated lines; only three shapes
//! are recognized. Everything else is surfaced as [`Line::Malformed`] so
//! the caller can decide whether to discard or abort.

use regex::Regex;

use crate::error::ProtocolError;

const ADDRESSED_PATTERN: &str = r"^:(\S+) (\S+) (\S+) :?(.*)\r\n$";
const PING_PATTERN: &str = r"^PING :(.*)\r\n$";
const FATAL_PATTERN: &str = r"^ERROR :(.*)\r\n$";

/// A raw inbound line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `:<sender> <command> <receiver> [:]<text>` - the standard prefixed
    /// shape. The optional colon before the text is stripped.
    Addressed {
        /// Originating identity.
        sender: String,
        /// Protocol verb or numeric.
        command: String,
        /// Target identity or channel.
        receiver: String,
        /// Remainder of the line.
        text: String,
    },
    /// `PING :<token>` keep-alive probe. The caller is expected to answer
    /// with `PONG :<token>`.
    Ping {
        /// Probe token to echo back.
        token: String,
    },
    /// `ERROR :<message>` - the peer is tearing the session down.
    Fatal {
        /// Reason given by the peer.
        message: String,
    },
    /// Matched none of the recognized shapes.
    Malformed {
        /// The offending line, untouched.
        line: String,
    },
}

/// Sorts raw inbound lines into [`Line`] variants.
///
/// Holds the compiled grammar; build one per connection and reuse it for
/// every line.
pub struct Classifier {
    addressed: Regex,
    ping: Regex,
    fatal: Regex,
}

impl Classifier {
    /// Compile the line grammar.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile (should not happen
    /// in practice, but avoids panicking in library code).
    pub fn new() -> Result<Self, ProtocolError> {
        Ok(Self {
            addressed: Regex::new(ADDRESSED_PATTERN)?,
            ping: Regex::new(PING_PATTERN)?,
            fatal: Regex::new(FATAL_PATTERN)?,
        })
    }

    /// Classify one raw line. The shapes are tried in fixed order:
    /// addressed, keep-alive probe, fatal error.
    pub fn classify(&self, raw: &str) -> Line {
        if let Some(caps) = self.addressed.captures(raw) {
            return Line::Addressed {
                sender: caps[1].to_string(),
                command: caps[2].to_string(),
                receiver: caps[3].to_string(),
                text: caps[4].to_string(),
            };
        }
        if let Some(caps) = self.ping.captures(raw) {
            return Line::Ping {
                token: caps[1].to_string(),
            };
        }
        if let Some(caps) = self.fatal.captures(raw) {
            return Line::Fatal {
                message: caps[1].to_string(),
            };
        }
        Line::Malformed {
            line: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn classifier() -> Classifier {
        Classifier::new().unwrap()
    }

    #[test]
    fn addressed_line_with_trailing_colon() {
        let line = classifier().classify(":irc.example.net 001 skald :Welcome to IRC\r\n");
        assert_eq!(
            line,
            Line::Addressed {
                sender: "irc.example.net".to_string(),
                command: "001".to_string(),
                receiver: "skald".to_string(),
                text: "Welcome to IRC".to_string(),
            }
        );
    }

    #[test]
    fn addressed_line_without_trailing_colon() {
        let line = classifier().classify(":nick!u@h MODE #test +o skald\r\n");
        match line {
            Line::Addressed { command, text, .. } => {
                assert_eq!(command, "MODE");
                assert_eq!(text, "+o skald");
            }
            other => panic!("expected addressed line, got {other:?}"),
        }
    }

    #[test]
    fn ping_probe() {
        let line = classifier().classify("PING :irc.example.net\r\n");
        assert_eq!(
            line,
            Line::Ping {
                token: "irc.example.net".to_string()
            }
        );
    }

    #[test]
    fn fatal_error() {
        let line = classifier().classify("ERROR :Closing Link: excess flood\r\n");
        assert_eq!(
            line,
            Line::Fatal {
                message: "Closing Link: excess flood".to_string()
            }
        );
    }

    #[test]
    fn unterminated_line_is_malformed() {
        // Inbound records carry a carriage return; a bare line feed is not
        // part of the grammar.
        let line = classifier().classify("PING :irc.example.net\n");
        assert!(matches!(line, Line::Malformed { .. }));
    }

    #[test]
    fn garbage_is_malformed() {
        let raw = "NOTICE AUTH without prefix\r\n";
        let line = classifier().classify(raw);
        assert_eq!(
            line,
            Line::Malformed {
                line: raw.to_string()
            }
        );
    }

    #[test]
    fn parsed_line_round_trips_to_equivalent_outbound_form() {
        let raw = ":alice!a@h PRIVMSG #test :hello there\r\n";
        match classifier().classify(raw) {
            Line::Addressed {
                command,
                receiver,
                text,
                ..
            } => {
                let outbound = Event {
                    command,
                    receiver,
                    text,
                    ..Event::default()
                };
                assert_eq!(outbound.to_line(), "PRIVMSG #test :hello there\n");
            }
            other => panic!("expected addressed line, got {other:?}"),
        }
    }
}
