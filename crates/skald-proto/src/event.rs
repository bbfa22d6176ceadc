//! The event value type exchanged with chat backends.

/// A single unit of chat communication, in either direction.
///
/// Events produced by parsing inbound traffic carry the original line in
/// `raw`. Outbound events leave `raw` empty; the wire form is synthesized
/// at send time by [`Event::to_line`] from `command`, `receiver`, and
/// `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Payload content. May be empty.
    pub text: String,
    /// Protocol verb or numeric. Empty for plain outbound text.
    pub command: String,
    /// Originating identity. Empty for locally constructed events.
    pub sender: String,
    /// Target identity or channel.
    pub receiver: String,
    /// The untouched inbound line, for diagnostics. Empty on outbound events.
    pub raw: String,
}

impl Event {
    /// Serialize to the outbound wire form: `<COMMAND> [<RECEIVER>] [:<TEXT>]`
    /// followed by a line feed.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(
            self.command.len() + self.receiver.len() + self.text.len() + 4,
        );
        line.push_str(&self.command);
        if !self.receiver.is_empty() {
            line.push(' ');
            line.push_str(&self.receiver);
        }
        if !self.text.is_empty() {
            line.push_str(" :");
            line.push_str(&self.text);
        }
        line.push('\n');
        line
    }

    /// The nickname portion of `sender`, without the `user@host` suffix.
    pub fn sender_nick(&self) -> &str {
        self.sender.split('!').next().unwrap_or("")
    }

    /// A `NICK` declaration.
    pub fn nick(nick: &str) -> Self {
        Self {
            command: "NICK".to_string(),
            receiver: nick.to_string(),
            ..Self::default()
        }
    }

    /// A `USER` registration carrying the display name. The mode and
    /// unused parameters are fixed at `0 *`.
    pub fn user(nick: &str, realname: &str) -> Self {
        Self {
            command: "USER".to_string(),
            receiver: format!("{nick} 0 *"),
            text: realname.to_string(),
            ..Self::default()
        }
    }

    /// A `JOIN` request for a channel.
    pub fn join(channel: &str) -> Self {
        Self {
            command: "JOIN".to_string(),
            receiver: channel.to_string(),
            ..Self::default()
        }
    }

    /// A `PART` request for a channel.
    pub fn part(channel: &str) -> Self {
        Self {
            command: "PART".to_string(),
            receiver: channel.to_string(),
            ..Self::default()
        }
    }

    /// A `PRIVMSG` to a channel or nick.
    pub fn privmsg(target: &str, text: &str) -> Self {
        Self {
            command: "PRIVMSG".to_string(),
            receiver: target.to_string(),
            text: text.to_string(),
            ..Self::default()
        }
    }

    /// An outbound `PING` probe.
    pub fn ping(token: &str) -> Self {
        Self {
            command: "PING".to_string(),
            receiver: token.to_string(),
            ..Self::default()
        }
    }

    /// The reply to an inbound `PING`.
    pub fn pong(token: &str) -> Self {
        Self {
            command: "PONG".to_string(),
            text: token.to_string(),
            ..Self::default()
        }
    }

    /// A `QUIT` farewell.
    pub fn quit(reason: &str) -> Self {
        Self {
            command: "QUIT".to_string(),
            text: reason.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_command_receiver_and_text() {
        let event = Event::privmsg("#test", "hello there");
        assert_eq!(event.to_line(), "PRIVMSG #test :hello there\n");
    }

    #[test]
    fn omits_empty_receiver_and_text() {
        let event = Event::quit("bye");
        assert_eq!(event.to_line(), "QUIT :bye\n");

        let event = Event::join("#test");
        assert_eq!(event.to_line(), "JOIN #test\n");
    }

    #[test]
    fn login_pair_matches_wire_form() {
        assert_eq!(Event::nick("skald").to_line(), "NICK skald\n");
        assert_eq!(
            Event::user("skald", "Skald").to_line(),
            "USER skald 0 * :Skald\n"
        );
    }

    #[test]
    fn pong_carries_token_as_trailing() {
        assert_eq!(
            Event::pong("irc.example.net").to_line(),
            "PONG :irc.example.net\n"
        );
    }

    #[test]
    fn sender_nick_strips_user_and_host() {
        let event = Event {
            sender: "alice!ident@host.example".to_string(),
            ..Event::default()
        };
        assert_eq!(event.sender_nick(), "alice");

        let bare = Event {
            sender: "irc.example.net".to_string(),
            ..Event::default()
        };
        assert_eq!(bare.sender_nick(), "irc.example.net");
    }
}
