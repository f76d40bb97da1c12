//! IRC message grammar.
//!
//! One message per line: `[:prefix SP] verb [SP params] [SP :trailing]`,
//! CR-LF terminated on the wire. Parsing operates on a line whose terminator
//! the codec has already stripped.

use std::fmt;

use super::SERVER_NAME;

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message: a server name or a nick. Absent on most lines
    /// clients send.
    pub prefix: Option<String>,
    /// The command verb (`PRIVMSG`, `JOIN`, `001`, ...). Stored as received;
    /// the dispatcher uppercases for matching.
    pub verb: String,
    /// Positional parameters. A trailing parameter, if any, is the last.
    pub params: Vec<String>,
    /// Whether the last parameter was (or must be) written in `:`-trailing
    /// form. Serialization forces the colon anyway whenever the parameter
    /// could not survive whitespace tokenization.
    pub trailing: bool,
}

/// Reasons a line fails to parse into a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("prefix without a verb")]
    MissingVerb,
}

impl Message {
    /// A message originated by this server (`:42.IRC ...`).
    pub fn server(verb: &str, params: Vec<String>) -> Message {
        Message {
            prefix: Some(SERVER_NAME.to_owned()),
            verb: verb.to_owned(),
            params,
            trailing: false,
        }
    }

    /// A message relayed on behalf of a user (`:nick ...`).
    pub fn user(nick: &str, verb: &str, params: Vec<String>) -> Message {
        Message {
            prefix: Some(nick.to_owned()),
            verb: verb.to_owned(),
            params,
            trailing: false,
        }
    }

    /// An unprefixed message (`ERROR :...`).
    pub fn bare(verb: &str, params: Vec<String>) -> Message {
        Message {
            prefix: None,
            verb: verb.to_owned(),
            params,
            trailing: false,
        }
    }

    /// Mark the last parameter as a `:`-trailing parameter.
    pub fn trailing(mut self) -> Message {
        self.trailing = true;
        self
    }

    /// Parse one line, terminator already stripped.
    pub fn parse(line: &str) -> Result<Message, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = match line.strip_prefix(':') {
            Some(tail) => {
                let (pfx, rest) = tail.split_once(' ').ok_or(ParseError::MissingVerb)?;
                (Some(pfx.to_owned()), rest)
            }
            None => (None, line),
        };

        let mut tokens = rest;
        let verb = match tokens.split_once(' ') {
            Some((v, tail)) => {
                tokens = tail;
                v
            }
            None => {
                let v = tokens;
                tokens = "";
                v
            }
        };
        if verb.is_empty() {
            return Err(ParseError::MissingVerb);
        }

        let mut params = Vec::new();
        let mut trailing = false;
        while !tokens.is_empty() {
            if let Some(rest) = tokens.strip_prefix(':') {
                // Everything after the colon is one parameter, spaces kept.
                params.push(rest.to_owned());
                trailing = true;
                break;
            }
            match tokens.split_once(' ') {
                Some((tok, tail)) => {
                    // Consecutive spaces produce empty tokens; skip them.
                    if !tok.is_empty() {
                        params.push(tok.to_owned());
                    }
                    tokens = tail;
                }
                None => {
                    params.push(tokens.to_owned());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            verb: verb.to_owned(),
            params,
            trailing,
        })
    }

    /// Serialize to wire format, without the trailing `\r\n`.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        if let Some(prefix) = &self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(&self.verb);
        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                out.push(' ');
                out.push_str(param);
            }
            out.push(' ');
            if self.trailing || last.is_empty() || last.contains(' ') || last.starts_with(':') {
                out.push(':');
            }
            out.push_str(last);
        }
        out
    }

    /// Bytes this message occupies on the wire, CR-LF included. Used for
    /// outbound queue accounting.
    pub fn wire_len(&self) -> usize {
        self.to_wire().len() + 2
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}
