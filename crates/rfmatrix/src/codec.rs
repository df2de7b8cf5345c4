// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Packet framing and checksum.
//!
//! Every packet on the wire has the shape `{<body>}<checksum>`. The checksum
//! is a single printable character computed over the bracketed payload,
//! braces included:
//!
//! ```text
//! chk = chr((sum(ord(c) - 32 for c in "{body}") mod 95) + 32)
//! ```
//!
//! Requests are terminated with CRLF by the transport caller.

use thiserror::Error;

/// Opening frame delimiter.
pub const FRAME_START: char = '{';

/// Closing frame delimiter.
pub const FRAME_END: char = '}';

/// Request terminator appended before transmission.
pub const LINE_END: &str = "\r\n";

/// Token separator inside a frame.
pub const TOKEN_SEPARATOR: char = ',';

const CHECKSUM_OFFSET: i64 = 32;
const CHECKSUM_MODULUS: i64 = 95;

/// Packet encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Body contains a character that is not a single ASCII byte.
    #[error("Encoding error: body contains non-ASCII character {0:?}")]
    Encoding(char),

    /// Body contains a frame delimiter and would produce a malformed packet.
    #[error("Encoding error: body must not contain frame delimiter {0:?}")]
    Delimiter(char),
}

/// Compute the checksum character of a bracketed payload.
///
/// Bytes outside the printable range are not rejected; they contribute to
/// the sum arithmetically, as the device firmware does.
pub fn checksum(payload: &[u8]) -> char {
    let sum: i64 = payload
        .iter()
        .map(|&b| i64::from(b) - CHECKSUM_OFFSET)
        .sum();
    let value = sum.rem_euclid(CHECKSUM_MODULUS) + CHECKSUM_OFFSET;
    // value is always within 32..=126
    char::from(value as u8)
}

/// Wrap a body in braces and append its checksum.
///
/// The returned packet does not carry the line terminator; see
/// [`encode_request`] for the on-the-wire bytes.
pub fn encode(body: &str) -> Result<String, CodecError> {
    if let Some(c) = body.chars().find(|c| !c.is_ascii()) {
        return Err(CodecError::Encoding(c));
    }
    if let Some(c) = body.chars().find(|&c| c == FRAME_START || c == FRAME_END) {
        return Err(CodecError::Delimiter(c));
    }

    let mut packet = String::with_capacity(body.len() + 3);
    packet.push(FRAME_START);
    packet.push_str(body);
    packet.push(FRAME_END);
    let chk = checksum(packet.as_bytes());
    packet.push(chk);
    Ok(packet)
}

/// Encode a body into the exact bytes written to the socket (packet + CRLF).
pub fn encode_request(body: &str) -> Result<Vec<u8>, CodecError> {
    let mut packet = encode(body)?;
    packet.push_str(LINE_END);
    Ok(packet.into_bytes())
}

/// A framed reply with its inner content split into tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    /// Content strictly between the first `{` and the last `}`.
    pub inner: String,

    /// `inner` split on `,`.
    pub tokens: Vec<String>,

    /// Character following the closing brace, if any.
    pub checksum: Option<char>,
}

impl RawReply {
    /// The bracketed payload the checksum is computed over.
    pub fn payload(&self) -> String {
        format!("{}{}{}", FRAME_START, self.inner, FRAME_END)
    }

    /// The payload as wire bytes, one byte per character.
    ///
    /// Reply text holds one character per received byte, so this inverts
    /// that mapping. `None` if a character cannot have come off the wire.
    pub fn payload_bytes(&self) -> Option<Vec<u8>> {
        self.payload().chars().map(|c| u8::try_from(c).ok()).collect()
    }

    /// Recompute the checksum and compare with the received character.
    ///
    /// A reply without a trailing checksum character never validates.
    pub fn checksum_valid(&self) -> bool {
        match (self.checksum, self.payload_bytes()) {
            (Some(received), Some(bytes)) => checksum(&bytes) == received,
            _ => false,
        }
    }
}

/// Locate the frame in a raw reply and split its content into tokens.
///
/// Returns `None` when either delimiter is missing or the last `}` does not
/// come after the first `{`. The checksum is captured but not verified.
pub fn decode(raw: &str) -> Option<RawReply> {
    let start = raw.find(FRAME_START)?;
    let end = raw.rfind(FRAME_END)?;
    if end <= start {
        return None;
    }

    let inner = &raw[start + 1..end];
    let tokens = inner
        .split(TOKEN_SEPARATOR)
        .map(str::to_string)
        .collect();
    let checksum = raw[end + 1..]
        .chars()
        .next()
        .filter(|c| !matches!(c, '\r' | '\n'));

    Some(RawReply {
        inner: inner.to_string(),
        tokens,
        checksum,
    })
}
