//! Ping protocol parser.

/// Parsed ping command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Simple ping (no message).
    Ping,
    /// Ping with a message to echo back.
    PingMsg(Vec<u8>),
}

/// Parse result.
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed command.
    Complete(Command),
    /// Protocol error (unknown command).
    Error,
}

/// Parse a ping command from one datagram.
///
/// A datagram holds exactly one command; a trailing `\r\n` or `\n` is
/// optional.
pub fn parse(input: &[u8]) -> ParseResult {
    let line = strip_line_ending(input);

    // Parse command (case-insensitive)
    if line.eq_ignore_ascii_case(b"PING") {
        ParseResult::Complete(Command::Ping)
    } else if line.len() > 5 && line[..5].eq_ignore_ascii_case(b"PING ") {
        ParseResult::Complete(Command::PingMsg(line[5..].to_vec()))
    } else {
        ParseResult::Error
    }
}

/// Format a PONG response.
pub fn response_pong() -> &'static [u8] {
    b"PONG\r\n"
}

/// Format a PONG response with message.
pub fn response_pong_msg(msg: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(5 + msg.len() + 2); // "PONG " + msg + "\r\n"
    output.extend_from_slice(b"PONG ");
    output.extend_from_slice(msg);
    output.extend_from_slice(b"\r\n");
    output
}

/// Format an error response.
pub fn response_error() -> &'static [u8] {
    b"ERROR unknown command\r\n"
}

fn strip_line_ending(input: &[u8]) -> &[u8] {
    let input = input.strip_suffix(b"\n").unwrap_or(input);
    input.strip_suffix(b"\r").unwrap_or(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping() {
        for input in [&b"PING"[..], b"ping", b"PING\r\n", b"Ping\n"] {
            match parse(input) {
                ParseResult::Complete(Command::Ping) => {}
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_ping_msg() {
        match parse(b"PING hello\r\n") {
            ParseResult::Complete(Command::PingMsg(msg)) => {
                assert_eq!(msg, b"hello");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command() {
        for input in [&b"FOO"[..], b"", b"PING "] {
            match parse(input) {
                ParseResult::Error => {}
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[test]
    fn test_response_pong_msg() {
        assert_eq!(response_pong_msg(b"hello"), b"PONG hello\r\n");
    }
}
