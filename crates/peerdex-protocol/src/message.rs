//! Protocol message definitions.

use crate::{ProtocolError, Result, FIELD_SEPARATOR};
use peerdex_core::PeerId;
use std::fmt;

/// The kind of message, identified on the wire by its keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Peer registration.
    Hello,
    /// Positive reply.
    Ok,
    /// Error reply.
    Error,
    /// Announce one file.
    Publish,
    /// Replace the full announced file list.
    Update,
    /// Look up the providers of a file.
    Fetch,
    /// Reply to FETCH and DISCOVER (both shapes).
    Result,
    /// Liveness check.
    Ping,
    /// Reply to PING.
    Alive,
    /// Request a listing of the directory.
    Discover,
    /// Request a file from another peer.
    Get,
    /// File transfer header.
    Data,
    /// Graceful leave.
    Bye,
}

impl MessageKind {
    /// All message kinds.
    pub const ALL: [MessageKind; 13] = [
        Self::Hello,
        Self::Ok,
        Self::Error,
        Self::Publish,
        Self::Update,
        Self::Fetch,
        Self::Result,
        Self::Ping,
        Self::Alive,
        Self::Discover,
        Self::Get,
        Self::Data,
        Self::Bye,
    ];

    /// Returns the wire keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Hello => "HELLO",
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Publish => "PUBLISH",
            Self::Update => "UPDATE",
            Self::Fetch => "FETCH",
            Self::Result => "RESULT",
            Self::Ping => "PING",
            Self::Alive => "ALIVE",
            Self::Discover => "DISCOVER",
            Self::Get => "GET",
            Self::Data => "DATA",
            Self::Bye => "BYE",
        }
    }

    /// Parses a keyword, ignoring ASCII case.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One line of a directory listing: a file and everyone providing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// The announced filename.
    pub filename: String,
    /// Identities of the peers providing it.
    pub providers: Vec<PeerId>,
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `HELLO <name> <port>`
    Hello {
        /// Peer name; becomes the host part of its identity.
        name: String,
        /// Data-plane listening port.
        port: u16,
    },
    /// `OK <text>`
    Ok {
        /// Free-form acknowledgement.
        text: String,
    },
    /// `ERROR <code> <description>`
    Error {
        /// Machine-readable code, see [`crate::codes`].
        code: String,
        /// Human-readable reason.
        description: String,
    },
    /// `PUBLISH <filename>|||<peer-id>`
    Publish {
        /// Announced filename.
        filename: String,
        /// Announcing peer.
        peer: PeerId,
    },
    /// `UPDATE <peer-id> <f1>|||<f2>|||...`
    Update {
        /// Announcing peer.
        peer: PeerId,
        /// Complete list of files the peer now provides.
        files: Vec<String>,
    },
    /// `FETCH <filename>`
    Fetch {
        /// File to look up.
        filename: String,
    },
    /// `RESULT <item> <item> ...`
    ///
    /// Provider identities for FETCH, or filenames for a scoped DISCOVER.
    Result {
        /// Space-separated items; empty when nothing matched.
        items: Vec<String>,
    },
    /// A bare `RESULT` line followed by one `filename: p1, p2` line per file.
    Listing {
        /// Every file in the directory.
        entries: Vec<ListingEntry>,
    },
    /// `PING [<peer-id>]`
    Ping {
        /// Identity to refresh; the session's own when absent.
        peer: Option<PeerId>,
    },
    /// `ALIVE`
    Alive,
    /// `DISCOVER [<peer-id>]`
    Discover {
        /// Restrict the reply to one peer's files.
        peer: Option<PeerId>,
    },
    /// `GET <filename>|||<requester-peer-id>`
    Get {
        /// Requested file.
        filename: String,
        /// Who is asking.
        requester: PeerId,
    },
    /// `DATA <filename>|||<byte-count>`, followed by the raw bytes.
    Data {
        /// File being sent.
        filename: String,
        /// Exact number of payload bytes that follow.
        size: u64,
    },
    /// `BYE`
    Bye,
}

impl Message {
    /// Builds an `OK` reply.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Ok { text: text.into() }
    }

    /// Builds an `ERROR` reply.
    #[must_use]
    pub fn error(code: &str, description: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            description: description.into(),
        }
    }

    /// Builds a `RESULT` reply listing provider identities.
    #[must_use]
    pub fn providers(providers: &[PeerId]) -> Self {
        Self::Result {
            items: providers.iter().map(ToString::to_string).collect(),
        }
    }

    /// Returns the message kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Hello { .. } => MessageKind::Hello,
            Self::Ok { .. } => MessageKind::Ok,
            Self::Error { .. } => MessageKind::Error,
            Self::Publish { .. } => MessageKind::Publish,
            Self::Update { .. } => MessageKind::Update,
            Self::Fetch { .. } => MessageKind::Fetch,
            Self::Result { .. } | Self::Listing { .. } => MessageKind::Result,
            Self::Ping { .. } => MessageKind::Ping,
            Self::Alive => MessageKind::Alive,
            Self::Discover { .. } => MessageKind::Discover,
            Self::Get { .. } => MessageKind::Get,
            Self::Data { .. } => MessageKind::Data,
            Self::Bye => MessageKind::Bye,
        }
    }

    /// Checks that every field can be encoded without ambiguity.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidField`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Hello { name, .. } => check_token("name", name),
            Self::Ok { text } => check_line("text", text),
            Self::Error { code, description } => {
                check_token("code", code)?;
                check_line("description", description)
            }
            Self::Publish { filename, .. }
            | Self::Fetch { filename }
            | Self::Get { filename, .. }
            | Self::Data { filename, .. } => check_filename(filename),
            Self::Update { files, .. } => files.iter().try_for_each(|f| check_filename(f)),
            Self::Result { items } => items.iter().try_for_each(|i| check_token("item", i)),
            Self::Listing { entries } => entries
                .iter()
                .try_for_each(|entry| check_filename(&entry.filename)),
            Self::Ping { .. } | Self::Alive | Self::Discover { .. } | Self::Bye => Ok(()),
        }
    }

    /// Encodes the message as wire text.
    ///
    /// The caller is expected to have checked [`Message::validate`]; the
    /// frame writer does so before sending.
    #[must_use]
    pub fn encode(&self) -> String {
        let keyword = self.kind().keyword();
        match self {
            Self::Hello { name, port } => format!("{keyword} {name} {port}"),
            Self::Ok { text } => with_optional(keyword, text),
            Self::Error { code, description } => {
                with_optional(&format!("{keyword} {code}"), description)
            }
            Self::Publish { filename, peer } => {
                format!("{keyword} {filename}{FIELD_SEPARATOR}{peer}")
            }
            Self::Update { peer, files } => {
                with_optional(&format!("{keyword} {peer}"), &files.join(FIELD_SEPARATOR))
            }
            Self::Fetch { filename } => format!("{keyword} {filename}"),
            Self::Result { items } => with_optional(keyword, &items.join(" ")),
            Self::Listing { entries } => {
                let mut out = format!("{keyword}\n");
                for entry in entries {
                    let providers: Vec<String> =
                        entry.providers.iter().map(ToString::to_string).collect();
                    out.push_str(&entry.filename);
                    out.push_str(": ");
                    out.push_str(&providers.join(", "));
                    out.push('\n');
                }
                out
            }
            Self::Ping { peer } | Self::Discover { peer } => match peer {
                Some(peer) => format!("{keyword} {peer}"),
                None => keyword.to_string(),
            },
            Self::Get {
                filename,
                requester,
            } => format!("{keyword} {filename}{FIELD_SEPARATOR}{requester}"),
            Self::Data { filename, size } => format!("{keyword} {filename}{FIELD_SEPARATOR}{size}"),
            Self::Alive | Self::Bye => keyword.to_string(),
        }
    }

    /// Decodes a message from raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the bytes are not UTF-8 or do
    /// not follow the grammar.
    pub fn decode_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| ProtocolError::Malformed(format!("invalid UTF-8: {e}")))?;
        Self::decode(text)
    }

    /// Decodes a message from wire text.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the keyword is unknown, a
    /// mandatory field is missing or unparsable, or a field fails
    /// [`Message::validate`].
    pub fn decode(text: &str) -> Result<Self> {
        let message = Self::decode_fields(text)?;
        message.validate().map_err(|e| match e {
            ProtocolError::InvalidField { .. } => ProtocolError::Malformed(e.to_string()),
            other => other,
        })?;
        Ok(message)
    }

    fn decode_fields(text: &str) -> Result<Self> {
        let (keyword, separator, rest) = match text.find([' ', '\n']) {
            Some(i) => (&text[..i], Some(&text[i..=i]), &text[i + 1..]),
            None => (text, None, ""),
        };
        let keyword = keyword.trim_end_matches('\r');
        let kind = MessageKind::from_keyword(keyword)
            .ok_or_else(|| ProtocolError::Malformed(format!("unknown keyword: {keyword:?}")))?;

        match kind {
            MessageKind::Hello => {
                let mut parts = rest.split_whitespace();
                let name = parts.next().ok_or_else(|| missing(kind, "name"))?;
                let port = parts.next().ok_or_else(|| missing(kind, "port"))?;
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ProtocolError::Malformed(format!("invalid port: {port:?}")))?;
                Ok(Self::Hello {
                    name: name.to_string(),
                    port,
                })
            }
            MessageKind::Ok => Ok(Self::Ok {
                text: rest.to_string(),
            }),
            MessageKind::Error => {
                let code = rest.split(' ').next().unwrap_or_default();
                if code.is_empty() {
                    return Err(missing(kind, "code"));
                }
                let description = rest.get(code.len() + 1..).unwrap_or_default();
                Ok(Self::Error {
                    code: code.to_string(),
                    description: description.to_string(),
                })
            }
            MessageKind::Publish => {
                let (filename, peer) = split_fields(kind, rest, "filename", "peer id")?;
                Ok(Self::Publish {
                    filename: filename.to_string(),
                    peer: parse_peer(peer)?,
                })
            }
            MessageKind::Update => {
                let (peer, files) = rest.split_once(' ').unwrap_or((rest, ""));
                if peer.is_empty() {
                    return Err(missing(kind, "peer id"));
                }
                let files = files
                    .split(FIELD_SEPARATOR)
                    .filter(|f| !f.is_empty())
                    .map(ToString::to_string)
                    .collect();
                Ok(Self::Update {
                    peer: parse_peer(peer)?,
                    files,
                })
            }
            MessageKind::Fetch => {
                if rest.is_empty() {
                    return Err(missing(kind, "filename"));
                }
                Ok(Self::Fetch {
                    filename: rest.to_string(),
                })
            }
            MessageKind::Result if separator == Some("\n") => {
                let entries = rest
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(parse_listing_line)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Listing { entries })
            }
            MessageKind::Result => Ok(Self::Result {
                items: rest.split_whitespace().map(ToString::to_string).collect(),
            }),
            MessageKind::Ping => Ok(Self::Ping {
                peer: parse_optional_peer(rest)?,
            }),
            MessageKind::Discover => Ok(Self::Discover {
                peer: parse_optional_peer(rest)?,
            }),
            MessageKind::Alive => Ok(Self::Alive),
            MessageKind::Bye => Ok(Self::Bye),
            MessageKind::Get => {
                let (filename, requester) = split_fields(kind, rest, "filename", "requester")?;
                Ok(Self::Get {
                    filename: filename.to_string(),
                    requester: parse_peer(requester)?,
                })
            }
            MessageKind::Data => {
                let (filename, size) = rest
                    .rsplit_once(FIELD_SEPARATOR)
                    .ok_or_else(|| missing(kind, "byte count"))?;
                if filename.is_empty() {
                    return Err(missing(kind, "filename"));
                }
                let size = size
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ProtocolError::Malformed(format!("invalid byte count: {size:?}")))?;
                Ok(Self::Data {
                    filename: filename.to_string(),
                    size,
                })
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn with_optional(head: &str, tail: &str) -> String {
    if tail.is_empty() {
        head.to_string()
    } else {
        format!("{head} {tail}")
    }
}

fn missing(kind: MessageKind, field: &str) -> ProtocolError {
    ProtocolError::Malformed(format!("{kind} is missing its {field}"))
}

fn split_fields<'a>(
    kind: MessageKind,
    rest: &'a str,
    first: &str,
    second: &str,
) -> Result<(&'a str, &'a str)> {
    let (a, b) = rest
        .split_once(FIELD_SEPARATOR)
        .ok_or_else(|| missing(kind, second))?;
    if a.is_empty() {
        return Err(missing(kind, first));
    }
    if b.trim().is_empty() {
        return Err(missing(kind, second));
    }
    Ok((a, b.trim()))
}

fn parse_peer(value: &str) -> Result<PeerId> {
    value
        .trim()
        .parse()
        .map_err(|e| ProtocolError::Malformed(format!("{e}")))
}

fn parse_optional_peer(value: &str) -> Result<Option<PeerId>> {
    let value = value.trim();
    if value.is_empty() {
        Ok(None)
    } else {
        parse_peer(value).map(Some)
    }
}

fn parse_listing_line(line: &str) -> Result<ListingEntry> {
    // Provider lists never contain ": ", so the last one ends the filename.
    let (filename, providers) = line
        .rsplit_once(": ")
        .ok_or_else(|| ProtocolError::Malformed(format!("invalid listing line: {line:?}")))?;
    let providers = providers
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_peer)
        .collect::<Result<Vec<_>>>()?;
    Ok(ListingEntry {
        filename: filename.to_string(),
        providers,
    })
}

fn check_token(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must not be empty",
        });
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must not contain whitespace",
        });
    }
    if value.contains(FIELD_SEPARATOR) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must not contain the field separator",
        });
    }
    Ok(())
}

fn check_line(field: &'static str, value: &str) -> Result<()> {
    if value.contains(['\n', '\r']) {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must be a single line",
        });
    }
    Ok(())
}

/// Checks that a filename can travel in any message field.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidField`] if the name is blank, spans
/// lines, contains the field separator, or starts or ends with a pipe.
pub fn check_filename(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::InvalidField {
            field: "filename",
            reason: "must not be blank",
        });
    }
    check_line("filename", value)?;
    if value.contains(FIELD_SEPARATOR) {
        return Err(ProtocolError::InvalidField {
            field: "filename",
            reason: "must not contain the field separator",
        });
    }
    // An edge pipe would merge into a neighbouring separator.
    if value.starts_with('|') || value.ends_with('|') {
        return Err(ProtocolError::InvalidField {
            field: "filename",
            reason: "must not start or end with a pipe",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn peer(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    fn table() -> Vec<(Message, &'static str)> {
        vec![
            (
                Message::Hello {
                    name: "alice".into(),
                    port: 5001,
                },
                "HELLO alice 5001",
            ),
            (Message::ok("registered"), "OK registered"),
            (Message::ok(""), "OK"),
            (
                Message::error("NOT_FOUND", "File not found"),
                "ERROR NOT_FOUND File not found",
            ),
            (
                Message::Publish {
                    filename: "my doc.txt".into(),
                    peer: peer("alice:5001"),
                },
                "PUBLISH my doc.txt|||alice:5001",
            ),
            (
                Message::Update {
                    peer: peer("alice:5001"),
                    files: vec!["a.txt".into(), "b c.txt".into()],
                },
                "UPDATE alice:5001 a.txt|||b c.txt",
            ),
            (
                Message::Update {
                    peer: peer("alice:5001"),
                    files: vec![],
                },
                "UPDATE alice:5001",
            ),
            (
                Message::Fetch {
                    filename: "big file.bin".into(),
                },
                "FETCH big file.bin",
            ),
            (
                Message::providers(&[peer("alice:5001"), peer("bob:5002")]),
                "RESULT alice:5001 bob:5002",
            ),
            (Message::Result { items: vec![] }, "RESULT"),
            (
                Message::Listing {
                    entries: vec![
                        ListingEntry {
                            filename: "doc.txt".into(),
                            providers: vec![peer("alice:5001"), peer("bob:5002")],
                        },
                        ListingEntry {
                            filename: "notes: draft.md".into(),
                            providers: vec![peer("bob:5002")],
                        },
                    ],
                },
                "RESULT\ndoc.txt: alice:5001, bob:5002\nnotes: draft.md: bob:5002\n",
            ),
            (Message::Listing { entries: vec![] }, "RESULT\n"),
            (Message::Ping { peer: None }, "PING"),
            (
                Message::Ping {
                    peer: Some(peer("alice:5001")),
                },
                "PING alice:5001",
            ),
            (Message::Alive, "ALIVE"),
            (Message::Discover { peer: None }, "DISCOVER"),
            (
                Message::Discover {
                    peer: Some(peer("bob:5002")),
                },
                "DISCOVER bob:5002",
            ),
            (
                Message::Get {
                    filename: "my doc.txt".into(),
                    requester: peer("bob:5002"),
                },
                "GET my doc.txt|||bob:5002",
            ),
            (
                Message::Data {
                    filename: "my doc.txt".into(),
                    size: 1000,
                },
                "DATA my doc.txt|||1000",
            ),
            (Message::Bye, "BYE"),
        ]
    }

    #[test]
    fn message_table_roundtrip() {
        for (message, wire) in table() {
            message.validate().unwrap();
            assert_eq!(message.encode(), wire);
            assert_eq!(Message::decode(wire).unwrap(), message, "decoding {wire:?}");
        }
    }

    #[test]
    fn every_kind_is_covered_by_the_table() {
        let kinds: Vec<MessageKind> = table().iter().map(|(m, _)| m.kind()).collect();
        for kind in MessageKind::ALL {
            assert!(kinds.contains(&kind), "{kind} missing from table");
        }
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(Message::decode("alive").unwrap(), Message::Alive);
        assert_eq!(
            Message::decode("fetch a.txt").unwrap(),
            Message::Fetch {
                filename: "a.txt".into()
            }
        );
    }

    #[test]
    fn decode_rejects_malformed() {
        let cases = [
            "",
            "BOGUS stuff",
            "HELLO",
            "HELLO alice",
            "HELLO alice notaport",
            "ERROR",
            "PUBLISH doc.txt",
            "PUBLISH |||alice:5001",
            "PUBLISH doc.txt|||not-an-id",
            "UPDATE",
            "FETCH",
            "GET doc.txt",
            "DATA doc.txt",
            "DATA doc.txt|||many",
            "PING not-an-id",
            "RESULT\ngarbage line",
            "PUBLISH notes||||alice:5001",
            "PUBLISH bad\nname|||alice:5001",
            "PUBLISH  |||alice:5001",
            "GET notes||||bob:5002",
            "UPDATE alice:5001 x||||y",
            "UPDATE alice:5001 a||| |||b",
            "FETCH two\rlines",
            "HELLO al|||ice 5001",
        ];
        for case in cases {
            let err = Message::decode(case).unwrap_err();
            assert!(
                matches!(err, ProtocolError::Malformed(_)),
                "{case:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn error_without_description() {
        let msg = Message::decode("ERROR UNREGISTERED").unwrap();
        assert_eq!(msg, Message::error("UNREGISTERED", ""));
        assert_eq!(msg.encode(), "ERROR UNREGISTERED");
    }

    #[test]
    fn validate_rejects_ambiguous_fields() {
        let bad = [
            Message::Fetch {
                filename: "a|||b".into(),
            },
            Message::Fetch {
                filename: "two\nlines".into(),
            },
            Message::Fetch {
                filename: "  ".into(),
            },
            Message::Hello {
                name: "al ice".into(),
                port: 1,
            },
            Message::error("BAD CODE", "x"),
            Message::Publish {
                filename: "notes|".into(),
                peer: peer("alice:5001"),
            },
            Message::Get {
                filename: "|notes".into(),
                requester: peer("bob:5002"),
            },
            Message::Update {
                peer: peer("alice:5001"),
                files: vec!["x|".into(), "y".into()],
            },
            Message::Result {
                items: vec!["has space".into()],
            },
        ];
        for message in bad {
            assert!(
                matches!(message.validate(), Err(ProtocolError::InvalidField { .. })),
                "{message:?} should not validate"
            );
        }
    }

    #[test]
    fn inner_pipes_survive_every_separated_field() {
        let cases = [
            Message::Publish {
                filename: "a|b||c".into(),
                peer: peer("alice:5001"),
            },
            Message::Get {
                filename: "a||b".into(),
                requester: peer("bob:5002"),
            },
            Message::Update {
                peer: peer("alice:5001"),
                files: vec!["x|y".into(), "y||z".into()],
            },
        ];
        for message in cases {
            message.validate().unwrap();
            assert_eq!(Message::decode(&message.encode()).unwrap(), message);
        }
    }

    #[test]
    fn data_filename_may_contain_separator_free_pipes() {
        let msg = Message::decode("DATA a|b.txt|||12").unwrap();
        assert_eq!(
            msg,
            Message::Data {
                filename: "a|b.txt".into(),
                size: 12
            }
        );
    }
}
