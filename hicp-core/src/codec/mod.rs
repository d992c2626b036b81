//! Wire codec for the line-oriented protocol.
//!
//! Messages are CR LF delimited text: a type line (`event: <verb>` or
//! `command: <verb>`), then headers, then a blank line. A header value
//! containing CR LF is carried as a data block, terminated either by a
//! byte count (`key:: length=<n>`) or a boundary line
//! (`key:: boundary=` followed by the boundary text). ESC (0x1B)
//! escapes the next byte inside boundary blocks.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::HicpError;
use crate::message::{Message, MessageKind};

/// Escape byte used inside boundary-delimited data blocks.
const ESC: u8 = 0x1b;

/// Upper bound on a single buffered message, including data blocks.
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

// ── Frame ────────────────────────────────────────────────────────

/// One decoded item off the wire.
///
/// A blank line (or EOF) arriving before any message content is a
/// peer disconnect, surfaced as its own variant so the read loop can
/// tell it apart from a parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(Message),
    Disconnect,
}

// ── Codec ────────────────────────────────────────────────────────

/// [`Decoder`] / [`Encoder`] pair for protocol messages.
#[derive(Debug)]
pub struct HicpCodec {
    max_frame: usize,
}

impl HicpCodec {
    pub fn new() -> Self {
        Self {
            max_frame: MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for HicpCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ── Parsing ──────────────────────────────────────────────────────

enum Parse {
    /// Not enough buffered bytes for a whole message.
    Incomplete,
    /// A frame, and how many bytes it consumed.
    Frame(Frame, usize),
    /// Unparseable message, consume it and keep going.
    Skip(usize),
}

/// Locate the next CR LF at or after `start`. Returns the index one
/// past the LF.
fn find_line_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

struct Unescaped {
    text: Vec<u8>,
    esc_count: usize,
    /// Index into the raw line just past the last escaped byte.
    after_last_esc_raw: usize,
    /// Same position, measured in the unescaped output.
    after_last_esc: usize,
}

/// Strip ESC escapes: each ESC takes the byte after it literally.
fn unescape(raw: &[u8]) -> Unescaped {
    let mut text = Vec::with_capacity(raw.len());
    let mut esc_count = 0;
    let mut after_last_esc_raw = 0;
    let mut after_last_esc = 0;
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == ESC && i + 1 < raw.len() {
            text.push(raw[i + 1]);
            i += 2;
            esc_count += 1;
            after_last_esc_raw = i;
            after_last_esc = text.len();
        } else {
            text.push(raw[i]);
            i += 1;
        }
    }
    Unescaped {
        text,
        esc_count,
        after_last_esc_raw,
        after_last_esc,
    }
}

/// Consume lines through the terminating blank line so a malformed
/// message can be dropped without desynchronizing the stream.
fn skip_message(buf: &[u8], mut pos: usize) -> Parse {
    loop {
        let Some(end) = find_line_end(buf, pos) else {
            return Parse::Incomplete;
        };
        let blank = end - pos == 2;
        pos = end;
        if blank {
            return Parse::Skip(pos);
        }
    }
}

/// Read a length-terminated data block starting at `pos`. The value
/// is the next `length` raw bytes; anything up to the following CR LF
/// is discarded.
fn parse_length_block(buf: &[u8], pos: usize, length: usize) -> Option<(String, usize)> {
    let value_end = pos.checked_add(length)?;
    if buf.len() < value_end {
        return None;
    }
    let value = String::from_utf8_lossy(&buf[pos..value_end]).into_owned();
    let next = find_line_end(buf, value_end)?;
    Some((value, next))
}

/// Read a boundary-terminated data block. `token` is the text after
/// `boundary=` on the header line; empty means the next full line is
/// the boundary.
fn parse_boundary_block(buf: &[u8], mut pos: usize, token: &str) -> Option<(String, usize)> {
    let full_line_boundary = token.is_empty();
    let boundary_line: Vec<u8> = if full_line_boundary {
        let end = find_line_end(buf, pos)?;
        let line = buf[pos..end].to_vec();
        pos = end;
        line
    } else {
        Vec::new()
    };

    let mut parts: Vec<Vec<u8>> = Vec::new();
    let mut prev_line_eol_esc = false;
    loop {
        let end = find_line_end(buf, pos)?;
        let raw = &buf[pos..end];
        pos = end;

        let un = unescape(raw);

        if full_line_boundary {
            if un.text == boundary_line && !prev_line_eol_esc && un.esc_count == 0 {
                // Boundary line reached. The CR LF before it belongs
                // to the boundary, not the value.
                if let Some(last) = parts.last_mut() {
                    last.truncate(last.len().saturating_sub(2));
                }
                break;
            }
        } else if let Some(idx) = find_subslice(&un.text, token.as_bytes()) {
            if idx >= un.after_last_esc {
                let mut part = un.text;
                part.truncate(idx);
                parts.push(part);
                break;
            }
        }

        prev_line_eol_esc = un.after_last_esc_raw >= raw.len().saturating_sub(2)
            && un.esc_count > 0;
        parts.push(un.text);
    }

    let joined: Vec<u8> = parts.concat();
    Some((String::from_utf8_lossy(&joined).into_owned(), pos))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_length_criterion(criterion: &str) -> Option<usize> {
    let rest = &criterion[criterion.find("length")? + "length".len()..];
    let rest = rest.trim_start().strip_prefix('=')?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn try_parse(buf: &[u8], max: usize) -> Result<Parse, HicpError> {
    let incomplete = |buf: &[u8]| {
        if buf.len() >= max {
            Err(HicpError::MessageTooLarge {
                size: buf.len(),
                max,
            })
        } else {
            Ok(Parse::Incomplete)
        }
    };

    let Some(mut pos) = find_line_end(buf, 0) else {
        return incomplete(buf);
    };
    let type_line = &buf[..pos - 2];

    if type_line.is_empty() {
        // Blank line before any message content: the peer went away.
        return Ok(Parse::Frame(Frame::Disconnect, pos));
    }

    let type_text = String::from_utf8_lossy(type_line);
    let Some(split) = type_text.find(": ").filter(|idx| *idx > 0) else {
        return Ok(skip_message(buf, pos));
    };
    let Ok(kind) = type_text[..split].parse::<MessageKind>() else {
        return Ok(skip_message(buf, pos));
    };
    let verb = type_text[split + 2..].to_string();
    let mut msg = Message::new(kind, verb);

    loop {
        let Some(end) = find_line_end(buf, pos) else {
            return incomplete(buf);
        };
        let raw = &buf[pos..end - 2];
        if raw.is_empty() {
            // Blank line ends the message.
            return Ok(Parse::Frame(Frame::Message(msg), end));
        }
        let line = String::from_utf8_lossy(raw).into_owned();
        pos = end;

        if let Some(idx) = line.find(":: ").filter(|idx| *idx > 0) {
            let key = &line[..idx];
            let criterion = &line[idx + 3..];
            if criterion.contains("length") {
                let Some(length) = parse_length_criterion(criterion) else {
                    msg.set_header(key, "");
                    continue;
                };
                if length > max {
                    return Err(HicpError::MessageTooLarge { size: length, max });
                }
                let Some((value, next)) = parse_length_block(buf, pos, length) else {
                    return incomplete(buf);
                };
                msg.set_header(key, value);
                pos = next;
            } else if let Some(after) = criterion.find("boundary=") {
                let token = &criterion[after + "boundary=".len()..];
                let Some((value, next)) = parse_boundary_block(buf, pos, token) else {
                    return incomplete(buf);
                };
                msg.set_header(key, value);
                pos = next;
            } else {
                // Unknown termination criterion. Value stays blank.
                msg.set_header(key, "");
            }
        } else if let Some(idx) = line.find(": ").filter(|idx| *idx > 0) {
            msg.set_header(&line[..idx], &line[idx + 2..]);
        } else {
            // Bare line, kept as an empty-valued header.
            msg.set_header(&line, "");
        }
    }
}

// ── Decoder / Encoder ────────────────────────────────────────────

impl Decoder for HicpCodec {
    type Item = Frame;
    type Error = HicpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, HicpError> {
        loop {
            match try_parse(&src[..], self.max_frame)? {
                Parse::Incomplete => return Ok(None),
                Parse::Frame(frame, consumed) => {
                    src.advance(consumed);
                    return Ok(Some(frame));
                }
                Parse::Skip(consumed) => {
                    tracing::warn!(bytes = consumed, "skipping unparseable message");
                    src.advance(consumed);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, HicpError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            Ok(None)
        } else {
            // Stream ended mid-message.
            src.clear();
            Ok(Some(Frame::Disconnect))
        }
    }
}

impl Encoder<Message> for HicpCodec {
    type Error = HicpError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), HicpError> {
        dst.extend_from_slice(msg.kind().as_str().as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(msg.verb().as_bytes());
        dst.extend_from_slice(b"\r\n");

        for (key, value) in msg.headers() {
            if value.contains("\r\n") {
                // Data block: boundary mode, escaping any embedded
                // terminator sequence.
                dst.extend_from_slice(key.as_bytes());
                dst.extend_from_slice(b":: boundary=\r\n--\r\n");
                let mut sep: &[u8] = b"";
                for part in value.split("\r\n--") {
                    dst.extend_from_slice(sep);
                    dst.extend_from_slice(part.as_bytes());
                    sep = b"\x1b\r\n--";
                }
                dst.extend_from_slice(b"\r\n--\r\n");
            } else {
                dst.extend_from_slice(key.as_bytes());
                dst.extend_from_slice(b": ");
                dst.extend_from_slice(value.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
        }

        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
