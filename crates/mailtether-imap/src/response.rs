//! Response parsing.
//!
//! A deliberately small, sans-I/O parser: it understands the status
//! responses, capability lists, mailbox size updates and header-field
//! FETCH literals that a keep-alive session and a folder watch rely on.
//! Anything else is surfaced as [`Untagged::Other`].

use crate::{Error, Result};

/// Status of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed.
    Bad,
    /// Greeting: connection is already authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    fn parse(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("OK") {
            Some(Self::Ok)
        } else if word.eq_ignore_ascii_case("NO") {
            Some(Self::No)
        } else if word.eq_ignore_ascii_case("BAD") {
            Some(Self::Bad)
        } else if word.eq_ignore_ascii_case("PREAUTH") {
            Some(Self::PreAuth)
        } else if word.eq_ignore_ascii_case("BYE") {
            Some(Self::Bye)
        } else {
            None
        }
    }
}

/// A single server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged completion of a command.
    Tagged {
        /// Tag of the completed command.
        tag: String,
        /// Completion status.
        status: Status,
        /// Bracketed response code without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged data.
    Untagged(Untagged),
    /// Command continuation request (`+`).
    Continuation {
        /// Text following the `+`.
        text: String,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Untagged {
    /// `* OK`, `* NO`, `* BAD`, `* PREAUTH` or `* BYE`.
    Status {
        /// Status word.
        status: Status,
        /// Bracketed response code without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(Vec<String>),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* n EXPUNGE`.
    Expunge(u32),
    /// `* n FETCH (...)`, with the first literal of the response if any.
    Fetch {
        /// Message sequence number.
        seq: u32,
        /// Literal payload (header block for header FETCH).
        literal: Option<Vec<u8>>,
    },
    /// Anything this parser does not model.
    Other(String),
}

impl Response {
    /// Parses one complete response as returned by
    /// [`FramedStream::read_response`](crate::FramedStream::read_response).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when the response is not valid UTF-8 in its
    /// first line or is structurally malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let line_end = raw
            .windows(2)
            .position(|w| w == b"\r\n")
            .unwrap_or(raw.len());
        let line = std::str::from_utf8(&raw[..line_end])
            .map_err(|e| Error::Parse(format!("response is not UTF-8: {e}")))?;

        if let Some(rest) = line.strip_prefix('+') {
            return Ok(Self::Continuation {
                text: rest.trim_start().to_string(),
            });
        }

        let (tag, rest) = line
            .split_once(' ')
            .ok_or_else(|| Error::Parse(format!("malformed response: {line:?}")))?;

        if tag == "*" {
            return Ok(Self::Untagged(parse_untagged(rest, raw, line_end)?));
        }

        let (word, tail) = split_word(rest);
        let status = Status::parse(word)
            .ok_or_else(|| Error::Parse(format!("unknown status {word:?} for tag {tag}")))?;
        let (code, text) = split_code(tail);
        Ok(Self::Tagged {
            tag: tag.to_string(),
            status,
            code,
            text,
        })
    }

    /// Returns true if this is the tagged completion for `tag`.
    #[must_use]
    pub fn is_tagged(&self, tag: &str) -> bool {
        matches!(self, Self::Tagged { tag: t, .. } if t == tag)
    }

    /// Returns capabilities announced by this response, either as a
    /// `CAPABILITY` untagged response or a `[CAPABILITY ...]` code.
    #[must_use]
    pub fn capabilities(&self) -> Option<Vec<String>> {
        match self {
            Self::Untagged(Untagged::Capability(caps)) => Some(caps.clone()),
            Self::Untagged(Untagged::Status { code: Some(code), .. })
            | Self::Tagged { code: Some(code), .. } => capabilities_from_code(code),
            _ => None,
        }
    }
}

fn parse_untagged(rest: &str, raw: &[u8], line_end: usize) -> Result<Untagged> {
    let (first, tail) = split_word(rest);

    if let Some(status) = Status::parse(first) {
        let (code, text) = split_code(tail);
        return Ok(Untagged::Status { status, code, text });
    }

    if first.eq_ignore_ascii_case("CAPABILITY") {
        return Ok(Untagged::Capability(
            tail.split_ascii_whitespace().map(str::to_string).collect(),
        ));
    }

    if let Ok(n) = first.parse::<u32>() {
        let (kind, _) = split_word(tail);
        if kind.eq_ignore_ascii_case("EXISTS") {
            return Ok(Untagged::Exists(n));
        }
        if kind.eq_ignore_ascii_case("RECENT") {
            return Ok(Untagged::Recent(n));
        }
        if kind.eq_ignore_ascii_case("EXPUNGE") {
            return Ok(Untagged::Expunge(n));
        }
        if kind.eq_ignore_ascii_case("FETCH") {
            let head = &raw[..line_end];
            let literal = literal_len(head)
                .map(|len| {
                    let start = line_end + 2;
                    raw.get(start..start + len).map(<[u8]>::to_vec).ok_or_else(|| {
                        Error::Parse(format!("FETCH literal truncated (expected {len} bytes)"))
                    })
                })
                .transpose()?;
            return Ok(Untagged::Fetch { seq: n, literal });
        }
    }

    Ok(Untagged::Other(rest.to_string()))
}

/// Length of a `{n}` or `{n+}` literal marker ending `line` (without CRLF).
fn literal_len(line: &[u8]) -> Option<usize> {
    let inner = line.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn split_word(s: &str) -> (&str, &str) {
    s.split_once(' ').unwrap_or((s, ""))
}

fn split_code(s: &str) -> (Option<String>, String) {
    if let Some(inner) = s.strip_prefix('[')
        && let Some(end) = inner.find(']')
    {
        let code = inner[..end].to_string();
        let text = inner[end + 1..].trim_start().to_string();
        return (Some(code), text);
    }
    (None, s.to_string())
}

fn capabilities_from_code(code: &str) -> Option<Vec<String>> {
    let (name, rest) = split_word(code);
    name.eq_ignore_ascii_case("CAPABILITY")
        .then(|| rest.split_ascii_whitespace().map(str::to_string).collect())
}

/// Parsed RFC 5322 header fields, as returned by a header-field FETCH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    /// Parses a header block, unfolding continuation lines.
    #[must_use]
    pub fn parse(block: &[u8]) -> Self {
        let text = String::from_utf8_lossy(block);
        let mut fields: Vec<(String, String)> = Vec::new();

        for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
            if line.is_empty() {
                continue;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                fields.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }

        Self { fields }
    }

    /// Returns the first value of the named field (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no fields were parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Headers of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeaders {
    /// Message sequence number.
    pub seq: u32,
    /// Fetched header fields.
    pub fields: HeaderFields,
}

impl MessageHeaders {
    /// Returns the `Subject` header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.fields.get("subject")
    }

    /// Returns the `From` header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.fields.get("from")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_ok_with_code() {
        let resp = Response::parse(b"A0001 OK [CAPABILITY IMAP4rev1 IDLE] Logged in\r\n").unwrap();
        assert!(resp.is_tagged("A0001"));
        assert_eq!(
            resp.capabilities().unwrap(),
            vec!["IMAP4rev1".to_string(), "IDLE".to_string()]
        );
        match resp {
            Response::Tagged { status, text, .. } => {
                assert_eq!(status, Status::Ok);
                assert_eq!(text, "Logged in");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no() {
        let resp = Response::parse(b"A0002 NO AUTHENTICATE failed.\r\n").unwrap();
        assert_eq!(
            resp,
            Response::Tagged {
                tag: "A0002".into(),
                status: Status::No,
                code: None,
                text: "AUTHENTICATE failed.".into(),
            }
        );
    }

    #[test]
    fn test_parse_untagged_variants() {
        assert_eq!(
            Response::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(Untagged::Exists(23))
        );
        assert_eq!(
            Response::parse(b"* 1 recent\r\n").unwrap(),
            Response::Untagged(Untagged::Recent(1))
        );
        assert_eq!(
            Response::parse(b"* 4 EXPUNGE\r\n").unwrap(),
            Response::Untagged(Untagged::Expunge(4))
        );
        assert_eq!(
            Response::parse(b"* CAPABILITY IMAP4rev1 AUTH=XOAUTH2\r\n").unwrap(),
            Response::Untagged(Untagged::Capability(vec![
                "IMAP4rev1".into(),
                "AUTH=XOAUTH2".into()
            ]))
        );
        assert_eq!(
            Response::parse(b"* FLAGS (\\Seen \\Deleted)\r\n").unwrap(),
            Response::Untagged(Untagged::Other("FLAGS (\\Seen \\Deleted)".into()))
        );
    }

    #[test]
    fn test_parse_bye() {
        let resp = Response::parse(b"* BYE Autologout; idle for too long\r\n").unwrap();
        assert_eq!(
            resp,
            Response::Untagged(Untagged::Status {
                status: Status::Bye,
                code: None,
                text: "Autologout; idle for too long".into(),
            })
        );
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            Response::parse(b"+ idling\r\n").unwrap(),
            Response::Continuation {
                text: "idling".into()
            }
        );
        assert_eq!(
            Response::parse(b"+\r\n").unwrap(),
            Response::Continuation {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_parse_fetch_literal() {
        let raw = b"* 12 FETCH (BODY[HEADER.FIELDS (SUBJECT FROM)] {36}\r\nSubject: Hi\r\nFrom: a@example.com\r\n\r\n)\r\n";
        let resp = Response::parse(raw).unwrap();
        match resp {
            Response::Untagged(Untagged::Fetch { seq, literal }) => {
                assert_eq!(seq, 12);
                let fields = HeaderFields::parse(&literal.unwrap());
                assert_eq!(fields.get("Subject"), Some("Hi"));
                assert_eq!(fields.get("FROM"), Some("a@example.com"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_fetch_truncated_literal() {
        let raw = b"* 1 FETCH (BODY[HEADER] {50}\r\nSubject: x\r\n";
        assert!(matches!(Response::parse(raw), Err(Error::Parse(_))));
    }

    #[test]
    fn test_header_unfolding() {
        let fields = HeaderFields::parse(b"Subject: A very\r\n long subject\r\nFrom: b@c.d\r\n\r\n");
        assert_eq!(fields.get("subject"), Some("A very long subject"));
        let headers = MessageHeaders { seq: 3, fields };
        assert_eq!(headers.from(), Some("b@c.d"));
    }

    #[test]
    fn test_malformed_response() {
        assert!(Response::parse(b"garbage\r\n").is_err());
        assert!(Response::parse(b"A1 MAYBE later\r\n").is_err());
    }
}
