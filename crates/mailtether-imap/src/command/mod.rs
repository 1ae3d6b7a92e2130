//! IMAP command builder.
//!
//! Only the commands a keep-alive session and a folder watch issue are
//! modelled here.

mod tag_generator;

pub use tag_generator::TagGenerator;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command with an optional SASL initial response.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Initial response (already base64 encoded).
        initial_response: Option<String>,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CLOSE command.
    Close,
    /// FETCH of selected header fields, without setting `\Seen`.
    FetchHeaders {
        /// First sequence number.
        first: u32,
        /// Last sequence number (inclusive).
        last: u32,
        /// Header field names.
        fields: Vec<String>,
    },
    /// IDLE command.
    Idle,
    /// DONE (to end IDLE).
    Done,
}

impl Command {
    /// Serializes the command to bytes with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::new();

        // DONE is sent untagged while IDLE is active
        if !matches!(self, Self::Done) {
            buf.extend_from_slice(tag.as_bytes());
            buf.push(b' ');
        }

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Idle => buf.extend_from_slice(b"IDLE"),
            Self::Done => buf.extend_from_slice(b"DONE"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
                if let Some(resp) = initial_response {
                    buf.push(b' ');
                    buf.extend_from_slice(resp.as_bytes());
                }
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }

            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_astring(&mut buf, mailbox);
            }

            Self::FetchHeaders {
                first,
                last,
                fields,
            } => {
                buf.extend_from_slice(b"FETCH ");
                if first == last {
                    buf.extend_from_slice(first.to_string().as_bytes());
                } else {
                    buf.extend_from_slice(format!("{first}:{last}").as_bytes());
                }
                buf.extend_from_slice(b" (BODY.PEEK[HEADER.FIELDS (");
                let names: Vec<String> = fields.iter().map(|f| f.to_ascii_uppercase()).collect();
                buf.extend_from_slice(names.join(" ").as_bytes());
                buf.extend_from_slice(b")])");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Returns the command name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Close => "CLOSE",
            Self::FetchHeaders { .. } => "FETCH",
            Self::Idle => "IDLE",
            Self::Done => "DONE",
        }
    }
}

/// Writes an astring (atom or quoted string).
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}
