//! Line framing for the client byte stream.
//!
//! Splits inbound bytes into IRC frames on `\r\n` boundaries (a bare `\n` is
//! accepted for leniency), parses each frame into a [`Message`], and
//! serializes outgoing messages with CR-LF termination.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::Message;

/// Maximum frame size on the wire, terminator included (RFC 1459 sets 512).
pub const MAX_FRAME: usize = 512;

/// Transport-level codec failure. Malformed frames are not errors: they are
/// dropped without a reply and decoding continues with the next frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Codec for one client connection.
///
/// Frames that exceed [`MAX_FRAME`], contain a NUL byte, or carry no verb are
/// discarded silently. When the buffer outgrows a full frame with no
/// terminator in sight, everything up to and including the next terminator
/// is thrown away and decoding resumes on whatever follows.
#[derive(Debug, Default)]
pub struct IrcCodec {
    /// Set while skipping the remainder of an oversized frame.
    discarding: bool,
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            let Some(nl) = src.iter().position(|&b| b == b'\n') else {
                if self.discarding {
                    src.clear();
                } else if src.len() > MAX_FRAME {
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let line = src.split_to(nl + 1);
            if self.discarding {
                // The terminator ends the frame being thrown away.
                self.discarding = false;
                continue;
            }
            if line.len() > MAX_FRAME || line.contains(&0) {
                continue;
            }

            let mut end = line.len() - 1;
            if end > 0 && line[end - 1] == b'\r' {
                end -= 1;
            }
            let Ok(text) = std::str::from_utf8(&line[..end]) else {
                continue;
            };
            match Message::parse(text) {
                Ok(msg) => return Ok(Some(msg)),
                // Bare terminators and prefix-only lines are no-ops.
                Err(_) => continue,
            }
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let wire = item.to_wire();
        dst.reserve(wire.len() + 2);
        dst.put_slice(wire.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut IrcCodec, buf: &mut BytesMut) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(msg) = codec.decode(buf).unwrap() {
            out.push(msg);
        }
        out
    }

    // ── Frame extraction ─────────────────────────────────────────

    #[test]
    fn complete_line() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from("NICK alice\r\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.verb, "NICK");
        assert_eq!(msg.params, vec!["alice"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_tail_carries_over() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from("NICK al");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"ice\r\nUSER");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.params, vec!["alice"]);
        // The unterminated USER stays buffered.
        assert_eq!(&buf[..], b"USER");
    }

    #[test]
    fn several_frames_per_read() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from("NICK alice\r\nUSER a 0 * :Alice\r\nJOIN #x\r\n");
        let msgs = decode_all(&mut codec, &mut buf);
        let verbs: Vec<_> = msgs.iter().map(|m| m.verb.as_str()).collect();
        assert_eq!(verbs, vec!["NICK", "USER", "JOIN"]);
    }

    #[test]
    fn bare_newline_accepted() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from("PING :tok\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.verb, "PING");
    }

    #[test]
    fn empty_frames_dropped() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from("\r\n\r\nPING :x\r\n");
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].verb, "PING");
    }

    #[test]
    fn nul_byte_rejects_frame() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from(&b"PRIVMSG #x :a\0b\r\nPING :x\r\n"[..]);
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].verb, "PING");
    }

    // ── Oversize handling ────────────────────────────────────────

    #[test]
    fn oversized_frame_dropped_without_reply() {
        let mut codec = IrcCodec::default();
        let mut long = vec![b'A'; MAX_FRAME];
        long.extend_from_slice(b"\r\n");
        let mut buf = BytesMut::from(&long[..]);
        buf.extend_from_slice(b"PING :x\r\n");
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].verb, "PING");
    }

    #[test]
    fn frame_at_exact_limit_survives() {
        let mut codec = IrcCodec::default();
        // "PING :" + token + "\r\n" == exactly MAX_FRAME bytes.
        let token = "t".repeat(MAX_FRAME - 8);
        let mut buf = BytesMut::from(format!("PING :{token}\r\n").as_str());
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.params[0].len(), MAX_FRAME - 8);
    }

    #[test]
    fn discard_mode_recovers_at_next_terminator() {
        let mut codec = IrcCodec::default();
        // Feed more than a frame's worth with no terminator: the codec must
        // discard and then resynchronize on the terminator that follows.
        let mut buf = BytesMut::from(vec![b'B'; MAX_FRAME + 100].as_slice());
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());

        buf.extend_from_slice(b"still the oversized frame\r\nPING :ok\r\n");
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].params, vec!["ok"]);
    }

    #[test]
    fn discard_mode_spans_reads() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::from(vec![b'C'; MAX_FRAME + 1].as_slice());
        assert!(codec.decode(&mut buf).unwrap().is_none());
        // More of the same frame arrives and is swallowed too.
        buf.extend_from_slice(&vec![b'C'; 300]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\r\nPING :back\r\n");
        let msgs = decode_all(&mut codec, &mut buf);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].params, vec!["back"]);
    }

    // ── Properties ───────────────────────────────────────────────

    #[test]
    fn extraction_inverts_concatenation() {
        // join(frames) fed byte by byte yields exactly the frames again.
        let frames = [
            "NICK alice",
            "USER a 0 * :Alice A",
            "JOIN #x,#y key",
            "PRIVMSG #x :hello world",
            "QUIT :later",
        ];
        let stream: String = frames.iter().map(|f| format!("{f}\r\n")).collect();

        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        for byte in stream.bytes() {
            buf.put_u8(byte);
            while let Some(msg) = codec.decode(&mut buf).unwrap() {
                out.push(msg);
            }
        }
        let expected: Vec<Message> = frames.iter().map(|f| Message::parse(f).unwrap()).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn encode_appends_crlf() {
        let mut codec = IrcCodec::default();
        let mut buf = BytesMut::new();
        let msg = Message::server("001", vec!["alice".into(), "Welcome".into()]).trailing();
        codec.encode(msg, &mut buf).unwrap();
        assert_eq!(&buf[..], b":42.IRC 001 alice :Welcome\r\n");
    }
}
