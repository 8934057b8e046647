//! Scanner for the v1 receive-pack request.
//!
//! The client sends optional shallow lines, then ref-update commands of the
//! form `<old-oid> <new-oid> <refname>`, a flush, and finally either a push
//! certificate block or the pack stream. Capabilities ride after the first
//! NUL of the first command line. Pack chunks are opaque and run until EOF.

use std::io::Read;

use bstr::ByteSlice;
use gitwire_core::capabilities::{parse_oid, trim_lf};
use gitwire_core::pktline::Packet;
use gitwire_core::scan::ScannerCore;
use gitwire_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Shallow,
    Commands,
    AfterCommands,
    PushCert,
    Pack,
    End,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Start => "start",
            State::Shallow => "shallow",
            State::Commands => "commands",
            State::AfterCommands => "after-commands",
            State::PushCert => "push-cert",
            State::Pack => "pack",
            State::End => "end",
        }
    }
}

/// Pull-based scanner over a v1 receive-pack request.
///
/// An empty command list (a bare flush) is legal, as is EOF right after the
/// flush for pushes that carry no pack (deletions only).
pub struct RequestScanner<R> {
    core: ScannerCore<R>,
    state: State,
}

impl<R: Read> RequestScanner<R> {
    /// Create a scanner over `input`.
    pub fn new(input: R) -> Self {
        Self {
            core: ScannerCore::new(input),
            state: State::Start,
        }
    }

    /// Fetch and validate the next packet; `false` on termination.
    pub fn advance(&mut self) -> bool {
        let packet = match self.core.next_packet() {
            Some(packet) => packet,
            None => return self.on_end(),
        };
        match self.step(&packet) {
            Ok(next) => {
                self.state = next;
                self.core.emit(packet)
            }
            Err(e) => self.core.fail(e),
        }
    }

    /// The most recent packet.
    pub fn current(&self) -> Option<&Packet> {
        self.core.current()
    }

    /// The terminal error, if the scanner stopped abnormally.
    pub fn error(&self) -> Option<&Error> {
        self.core.error()
    }

    fn on_end(&mut self) -> bool {
        if self.core.error().is_some() {
            return self.core.finish();
        }
        match self.state {
            // The pack runs until EOF, and a push without a pack ends right
            // after the command flush.
            State::AfterCommands | State::Pack | State::End => self.core.finish(),
            _ => self.core.fail(Error::ShortRead {
                when: "reading a receive-pack request",
            }),
        }
    }

    fn step(&self, packet: &Packet) -> Result<State> {
        match (self.state, packet) {
            (State::Start | State::Shallow, Packet::Data(line))
                if line.starts_with(b"shallow ") =>
            {
                let rest = trim_lf(line).strip_prefix(b"shallow ").unwrap_or_default();
                parse_oid(rest).map_err(|_| invalid("shallow", line))?;
                Ok(State::Shallow)
            }
            (State::Start | State::Shallow | State::Commands, Packet::Data(line)) => {
                validate_command_line(line)?;
                Ok(State::Commands)
            }
            // A client with nothing to push sends a bare flush.
            (State::Start | State::Commands, Packet::Flush) => Ok(State::AfterCommands),
            (State::AfterCommands, Packet::Data(line)) if is_push_cert_opening(line) => {
                Ok(State::PushCert)
            }
            (State::AfterCommands, Packet::Data(_)) => Ok(State::Pack),
            (State::PushCert, Packet::Data(line)) if trim_lf(line) == b"push-cert-end" => {
                Ok(State::Pack)
            }
            (State::PushCert, Packet::Data(_)) => Ok(State::PushCert),
            (State::Pack, Packet::Data(_)) => Ok(State::Pack),
            (state, packet) => Err(Error::UnexpectedPacket {
                state: state.name(),
                packet: packet.kind(),
            }),
        }
    }
}

/// Validate one `<old-oid> <new-oid> <refname>` command line.
///
/// Capabilities after a NUL are tolerated on any command line; only the
/// first carries them in practice, and later ones simply win.
fn validate_command_line(line: &[u8]) -> Result<()> {
    let trimmed = trim_lf(line);
    let before_nul = match trimmed.find_byte(0) {
        Some(at) => &trimmed[..at],
        None => trimmed,
    };
    let mut fields = before_nul.splitn_str(3, " ");
    let old = fields.next().filter(|f| !f.is_empty());
    let new = fields.next().filter(|f| !f.is_empty());
    let name = fields.next().filter(|f| !f.is_empty());
    match (old, new, name) {
        (Some(old), Some(new), Some(name)) => {
            parse_oid(old).map_err(|_| invalid("update command", line))?;
            parse_oid(new).map_err(|_| invalid("update command", line))?;
            if name.contains(&b' ') {
                return Err(invalid("update command", line));
            }
            Ok(())
        }
        _ => Err(invalid("update command", line)),
    }
}

fn is_push_cert_opening(line: &[u8]) -> bool {
    match line.strip_prefix(b"push-cert") {
        Some(rest) => rest.is_empty() || rest[0] == b'\0' || rest[0] == b'\n',
        None => false,
    }
}

fn invalid(what: &'static str, line: &[u8]) -> Error {
    Error::InvalidLine {
        what,
        line: line.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ZERO: &str = "0000000000000000000000000000000000000000";
    const ONE: &str = "1111111111111111111111111111111111111111";
    const TWO: &str = "2222222222222222222222222222222222222222";

    fn drain(input: Vec<u8>) -> (Vec<Packet>, Option<String>) {
        let mut scanner = RequestScanner::new(Cursor::new(input));
        let mut seen = Vec::new();
        while scanner.advance() {
            seen.push(scanner.current().unwrap().clone());
        }
        (seen, scanner.error().map(|e| e.to_string()))
    }

    #[test]
    fn create_command_with_caps_then_pack_until_eof() {
        let mut input = format!(
            "0093{ZERO} {ONE} refs/heads/main\0report-status side-band-64k agent=git/2.43.0\n"
        )
        .into_bytes();
        input.extend_from_slice(b"0000");
        input.extend_from_slice(b"0010PACK\x00\x00\x00\x02etc.");
        input.extend_from_slice(b"000fmore pack..");
        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn shallow_lines_precede_the_commands() {
        let mut input = format!("0035shallow {ONE}\n").into_bytes();
        input.extend_from_slice(format!("0074{ONE} {TWO} refs/heads/main\0report-status\n").as_bytes());
        input.extend_from_slice(b"0000");
        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn delete_only_push_has_no_pack() {
        let mut input = format!("0066{ONE} {ZERO} refs/heads/gone\n").into_bytes();
        input.extend_from_slice(b"0000");
        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn bare_flush_is_an_empty_push() {
        let (seen, err) = drain(b"0000".to_vec());
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen, vec![Packet::Flush]);
    }

    #[test]
    fn push_cert_block_runs_until_its_end_marker() {
        let mut input = format!("0066{ZERO} {ONE} refs/heads/main\n").into_bytes();
        input.extend_from_slice(b"0000");
        input.extend_from_slice(b"0010push-cert\0a\n");
        input.extend_from_slice(b"002bcertificate version 0.1\npusher someone\n");
        input.extend_from_slice(b"0012push-cert-end\n");
        input.extend_from_slice(b"000ePACK\x00\x00\x00\x02ab");
        let (seen, err) = drain(input);
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn both_zero_ids_still_need_valid_hex() {
        let input = format!("0066{ZERO} {ZERO} refs/heads/main\n0000").into_bytes();
        let (seen, err) = drain(input);
        // Frame validation stops at structure; zero-to-zero policy is the
        // server's concern.
        assert!(err.is_none(), "unexpected error: {err:?}");
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn malformed_command_is_invalid() {
        let input = format!("0046{ONE} notahash refs/heads/main\n").into_bytes();
        let (_, err) = drain(input);
        assert!(err.unwrap().contains("malformed update command"));
    }

    #[test]
    fn truncated_command_list_is_a_short_read() {
        let input = format!("0066{ZERO} {ONE} refs/heads/main\n").into_bytes();
        let (_, err) = drain(input);
        assert!(err.unwrap().contains("unexpected end of input"));
    }
}
