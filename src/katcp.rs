//! KATCP line codec.
//!
//! Every message is one line: a type character (`?` request, `!` reply, `#` inform), a name,
//! and whitespace separated arguments. Arguments are raw bytes with a small escape table so
//! binary register contents survive the line framing.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Request,
    Reply,
    Inform,
}

impl Kind {
    fn sigil(self) -> u8 {
        match self {
            Kind::Request => b'?',
            Kind::Reply => b'!',
            Kind::Inform => b'#',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: Kind,
    pub name: String,
    pub args: Vec<Vec<u8>>,
}

impl Message {
    pub fn request<A: AsRef<[u8]>>(name: &str, args: &[A]) -> Message {
        Message {
            kind: Kind::Request,
            name: name.to_string(),
            args: args.iter().map(|a| a.as_ref().to_vec()).collect(),
        }
    }

    /// Serialises the message including the terminating newline.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = vec![self.kind.sigil()];
        line.extend_from_slice(self.name.as_bytes());
        for a in &self.args {
            line.push(b' ');
            line.extend(escape(a));
        }
        line.push(b'\n');
        line
    }

    pub fn parse(line: &[u8]) -> Result<Message> {
        let line = trim_eol(line);
        let mut tokens = line
            .split(|&c| c == b' ' || c == b'\t')
            .filter(|t| !t.is_empty());

        let head = tokens
            .next()
            .ok_or_else(|| Error::Protocol("empty line".to_string()))?;
        let kind = match head[0] {
            b'?' => Kind::Request,
            b'!' => Kind::Reply,
            b'#' => Kind::Inform,
            c => {
                return Err(Error::Protocol(format!(
                    "unknown message type {:?}",
                    c as char
                )));
            }
        };
        // message ids look like `!read[7]`
        let name = &head[1..];
        let name = match name.iter().position(|&c| c == b'[') {
            Some(p) => &name[..p],
            None => name,
        };
        if name.is_empty() {
            return Err(Error::Protocol("message without name".to_string()));
        }
        let name = String::from_utf8(name.to_vec())
            .map_err(|_| Error::Protocol("non-utf8 message name".to_string()))?;

        let args = tokens.map(unescape).collect::<Result<Vec<_>>>()?;
        Ok(Message { kind, name, args })
    }

    /// Replies carry their status in the first argument.
    pub fn is_ok(&self) -> bool {
        self.args.first().map(|a| a.as_slice()) == Some(b"ok".as_slice())
    }

    pub fn arg_str(&self, i: usize) -> Option<String> {
        self.args
            .get(i)
            .map(|a| String::from_utf8_lossy(a).into_owned())
    }

    /// Status plus any message text, for error reporting.
    pub fn reason(&self) -> String {
        self.args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn trim_eol(mut line: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = line.split_last() {
        if last == b'\n' || last == b'\r' {
            line = rest;
        } else {
            break;
        }
    }
    line
}

pub fn escape(arg: &[u8]) -> Vec<u8> {
    if arg.is_empty() {
        return b"\\@".to_vec();
    }
    let mut out = Vec::with_capacity(arg.len());
    for &c in arg {
        match c {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b' ' => out.extend_from_slice(b"\\_"),
            0 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1b => out.extend_from_slice(b"\\e"),
            b'\t' => out.extend_from_slice(b"\\t"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(arg: &[u8]) -> Result<Vec<u8>> {
    if arg == b"\\@" {
        return Ok(vec![]);
    }
    let mut out = Vec::with_capacity(arg.len());
    let mut iter = arg.iter();
    while let Some(&c) = iter.next() {
        if c != b'\\' {
            out.push(c);
            continue;
        }
        let e = iter
            .next()
            .ok_or_else(|| Error::Protocol("dangling escape".to_string()))?;
        out.push(match e {
            b'\\' => b'\\',
            b'_' => b' ',
            b'0' => 0,
            b'n' => b'\n',
            b'r' => b'\r',
            b'e' => 0x1b,
            b't' => b'\t',
            other => {
                return Err(Error::Protocol(format!(
                    "unknown escape \\{}",
                    *other as char
                )));
            }
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_request_with_binary_argument() {
        let msg = Message::request(
            "write",
            &[b"acc_len".to_vec(), b"0".to_vec(), vec![0, 3, b' ', 0x0a]],
        );
        assert_eq!(msg.encode(), b"?write acc_len 0 \\0\x03\\_\\n\n".to_vec());
    }

    #[test]
    fn parses_reply_with_id_and_escapes() {
        let msg = Message::parse(b"!read[3] ok \\0\\0\\_\\\\\r\n").unwrap();
        assert_eq!(msg.kind, Kind::Reply);
        assert_eq!(msg.name, "read");
        assert!(msg.is_ok());
        assert_eq!(msg.args[1], vec![0, 0, b' ', b'\\']);
    }

    #[test]
    fn empty_argument_uses_at_escape() {
        assert_eq!(escape(b""), b"\\@".to_vec());
        let msg = Message::parse(b"#log \\@ text").unwrap();
        assert_eq!(msg.kind, Kind::Inform);
        assert!(msg.args[0].is_empty());
    }

    #[test]
    fn failure_reason_is_joined() {
        let msg = Message::parse(b"!wordread fail register\\_not\\_found").unwrap();
        assert!(!msg.is_ok());
        assert_eq!(msg.reason(), "fail register not found");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(Message::parse(b"\n").is_err());
        assert!(Message::parse(b"read ok").is_err());
        assert!(Message::parse(b"!read ok \\q").is_err());
        assert!(Message::parse(b"!read ok \\").is_err());
    }
}
