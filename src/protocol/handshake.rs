//! Incremental handshake parser.
//!
//! Client bytes are accumulated per connection and re-parsed on every
//! arrival until the first frame is complete. Only the hostname is
//! interpreted; the whole accumulated buffer is handed back verbatim so it
//! can be replayed to the backend.
//!
//! Frame layout:
//! ```text
//! varint length | varint packet_id (0) | varint protocol | varint n | n bytes hostname | ...
//! ```

use thiserror::Error;

use super::varint::{self, VarIntError};

/// Largest accepted value of the packet-length prefix.
pub const MAX_PACKET_LEN: u32 = 300;

/// Largest accepted hostname length.
pub const MAX_ADDRESS_LEN: u32 = 255;

/// Packet id of the handshake.
pub const HANDSHAKE_PACKET_ID: u32 = 0x00;

/// Reasons a handshake is rejected. All are terminal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid packet length")]
    InvalidPacketLength,
    #[error("invalid packet id")]
    InvalidPacketId,
    #[error("invalid protocol version")]
    InvalidProtocolVersion,
    #[error("invalid server address length")]
    InvalidAddressLength,
    #[error("invalid characters in server address: {0:?}")]
    InvalidAddressCharset(String),
}

/// A successfully decoded handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHandshake {
    /// Hostname exactly as the client sent it.
    pub hostname: String,
    /// Protocol version field, uninterpreted.
    pub protocol_version: i32,
    /// Every byte received so far, including anything pipelined after the
    /// handshake frame.
    pub buffered: Vec<u8>,
}

/// Where the parser is in its single parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseProgress {
    AwaitingData,
    Parsed,
    Failed,
}

/// Result of feeding bytes to the parser.
#[derive(Debug, PartialEq, Eq)]
pub enum Feed {
    /// The frame is not complete yet.
    NeedMoreData,
    /// The frame decoded; the parser is finished.
    Parsed(ParsedHandshake),
    /// The parser already reached a terminal outcome; bytes were dropped.
    Ignored,
}

/// Per-connection handshake buffer and parser.
#[derive(Debug)]
pub struct HandshakeParser {
    buffer: Vec<u8>,
    progress: ParseProgress,
}

impl HandshakeParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            progress: ParseProgress::AwaitingData,
        }
    }

    /// Append `chunk` and try to decode the handshake.
    ///
    /// Once this returns `Parsed` or an error, later calls return `Ignored`.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed, ProtocolError> {
        if self.progress != ParseProgress::AwaitingData {
            return Ok(Feed::Ignored);
        }

        self.buffer.extend_from_slice(chunk);

        match parse_frame(&self.buffer) {
            Ok(None) => Ok(Feed::NeedMoreData),
            Ok(Some((hostname, protocol_version))) => {
                self.progress = ParseProgress::Parsed;
                Ok(Feed::Parsed(ParsedHandshake {
                    hostname,
                    protocol_version,
                    buffered: std::mem::take(&mut self.buffer),
                }))
            }
            Err(e) => {
                self.progress = ParseProgress::Failed;
                self.buffer.clear();
                Err(e)
            }
        }
    }

    pub fn progress(&self) -> ParseProgress {
        self.progress
    }

    /// Bytes held while awaiting the rest of the frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for HandshakeParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode the first frame of `buf`.
///
/// `Ok(None)` means more bytes are needed.
fn parse_frame(buf: &[u8]) -> Result<Option<(String, i32)>, ProtocolError> {
    let (packet_len, prefix_len) = match varint::decode(buf, 0) {
        Ok(v) => v,
        Err(VarIntError::Incomplete) => return Ok(None),
        Err(VarIntError::TooLong) => return Err(ProtocolError::InvalidPacketLength),
    };

    // The length field is a signed 32-bit integer on the wire.
    if (packet_len as i32) <= 0 || packet_len > MAX_PACKET_LEN {
        return Err(ProtocolError::InvalidPacketLength);
    }

    let frame_end = prefix_len + packet_len as usize;
    if buf.len() < frame_end {
        return Ok(None);
    }

    // Fields are decoded strictly inside the frame.
    let packet = &buf[prefix_len..frame_end];

    let (packet_id, mut offset) =
        varint::decode(packet, 0).map_err(|_| ProtocolError::InvalidPacketId)?;
    if packet_id != HANDSHAKE_PACKET_ID {
        return Err(ProtocolError::InvalidPacketId);
    }

    let (protocol_version, n) =
        varint::decode(packet, offset).map_err(|_| ProtocolError::InvalidProtocolVersion)?;
    offset += n;

    let (address_len, n) =
        varint::decode(packet, offset).map_err(|_| ProtocolError::InvalidAddressLength)?;
    offset += n;
    if address_len == 0 || address_len > MAX_ADDRESS_LEN {
        return Err(ProtocolError::InvalidAddressLength);
    }

    let address = packet
        .get(offset..offset + address_len as usize)
        .ok_or(ProtocolError::InvalidAddressLength)?;

    if !address.iter().copied().all(is_hostname_byte) {
        return Err(ProtocolError::InvalidAddressCharset(
            String::from_utf8_lossy(address).into_owned(),
        ));
    }

    // ASCII only at this point.
    let hostname = address.iter().map(|&b| char::from(b)).collect();

    Ok(Some((hostname, protocol_version as i32)))
}

/// `[A-Za-z0-9.-]`
pub fn is_hostname_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::varint::encode;

    fn frame(packet_id: u32, protocol: u32, host: &[u8]) -> Vec<u8> {
        let mut body = encode(packet_id);
        body.extend(encode(protocol));
        body.extend(encode(host.len() as u32));
        body.extend_from_slice(host);
        body.extend_from_slice(&25565u16.to_be_bytes());
        body.extend(encode(2));

        let mut out = encode(body.len() as u32);
        out.extend(body);
        out
    }

    #[test]
    fn parses_complete_handshake() {
        let bytes = frame(0, 763, b"play.example.com");
        let mut parser = HandshakeParser::new();

        match parser.feed(&bytes).unwrap() {
            Feed::Parsed(h) => {
                assert_eq!(h.hostname, "play.example.com");
                assert_eq!(h.protocol_version, 763);
                assert_eq!(h.buffered, bytes);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(parser.progress(), ParseProgress::Parsed);
        assert_eq!(parser.buffered_len(), 0);
    }

    #[test]
    fn keeps_pipelined_bytes() {
        let mut bytes = frame(0, 763, b"example.com");
        // login start queued right behind the handshake
        bytes.extend_from_slice(&[0x05, 0x00, 0x03, b'b', b'o', b'b']);

        let mut parser = HandshakeParser::new();
        let Feed::Parsed(h) = parser.feed(&bytes).unwrap() else {
            panic!("expected parse");
        };
        assert_eq!(h.buffered, bytes);
    }

    #[test]
    fn waits_for_split_writes() {
        let bytes = frame(0, 47, b"example.com");
        let mut parser = HandshakeParser::new();

        assert_eq!(parser.feed(&bytes[..1]).unwrap(), Feed::NeedMoreData);
        assert_eq!(parser.progress(), ParseProgress::AwaitingData);

        let Feed::Parsed(h) = parser.feed(&bytes[1..]).unwrap() else {
            panic!("expected parse");
        };
        assert_eq!(h.hostname, "example.com");
        assert_eq!(h.buffered, bytes);
    }

    #[test]
    fn byte_at_a_time_never_rejects_early() {
        let bytes = frame(0, 760, b"mc.example.org");
        let mut parser = HandshakeParser::new();

        for b in &bytes[..bytes.len() - 1] {
            assert_eq!(parser.feed(std::slice::from_ref(b)).unwrap(), Feed::NeedMoreData);
        }
        assert!(matches!(
            parser.feed(&bytes[bytes.len() - 1..]).unwrap(),
            Feed::Parsed(_)
        ));
    }

    #[test]
    fn rejects_bad_packet_lengths() {
        for prefix in [
            encode(0),
            encode(301),
            // -1 as a signed varint
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
            vec![0x80, 0x80, 0x80, 0x80, 0x80],
        ] {
            let mut parser = HandshakeParser::new();
            assert_eq!(
                parser.feed(&prefix),
                Err(ProtocolError::InvalidPacketLength),
                "prefix {prefix:?}"
            );
            assert_eq!(parser.progress(), ParseProgress::Failed);
        }
    }

    #[test]
    fn rejects_length_before_payload_arrives() {
        let mut parser = HandshakeParser::new();
        // 400 announced, nothing else sent
        assert_eq!(parser.feed(&encode(400)), Err(ProtocolError::InvalidPacketLength));
    }

    #[test]
    fn rejects_wrong_packet_id() {
        let mut parser = HandshakeParser::new();
        assert_eq!(
            parser.feed(&frame(1, 763, b"example.com")),
            Err(ProtocolError::InvalidPacketId)
        );
    }

    #[test]
    fn rejects_truncated_protocol_version() {
        // length 2: packet id, then a dangling continuation byte
        let mut parser = HandshakeParser::new();
        assert_eq!(
            parser.feed(&[0x02, 0x00, 0x80]),
            Err(ProtocolError::InvalidProtocolVersion)
        );
    }

    #[test]
    fn rejects_bad_address_lengths() {
        let mut parser = HandshakeParser::new();
        assert_eq!(parser.feed(&frame(0, 763, b"")), Err(ProtocolError::InvalidAddressLength));

        let long = vec![b'a'; 256];
        let mut parser = HandshakeParser::new();
        assert_eq!(parser.feed(&frame(0, 763, &long)), Err(ProtocolError::InvalidAddressLength));

        // claims 20 bytes of hostname inside a 5 byte packet
        let mut parser = HandshakeParser::new();
        assert_eq!(
            parser.feed(&[0x05, 0x00, 0x01, 0x14, b'a', b'b']),
            Err(ProtocolError::InvalidAddressLength)
        );
    }

    #[test]
    fn rejects_disallowed_characters() {
        let hosts: [&[u8]; 4] = [
            b"example.com/evil",
            b"exa mple.com",
            b"example.com\0FML\0",
            b"caf\xc3\xa9",
        ];
        for host in hosts {
            let mut parser = HandshakeParser::new();
            assert!(
                matches!(
                    parser.feed(&frame(0, 763, host)),
                    Err(ProtocolError::InvalidAddressCharset(_))
                ),
                "host {host:?}"
            );
        }
    }

    #[test]
    fn ignores_data_after_terminal_outcome() {
        let mut parser = HandshakeParser::new();
        assert!(parser.feed(&encode(0)).is_err());
        assert_eq!(parser.feed(&frame(0, 1, b"a.b")).unwrap(), Feed::Ignored);

        let mut parser = HandshakeParser::new();
        assert!(matches!(parser.feed(&frame(0, 1, b"a.b")).unwrap(), Feed::Parsed(_)));
        assert_eq!(parser.feed(b"more").unwrap(), Feed::Ignored);
    }

    #[test]
    fn hostname_charset() {
        assert!(b"Az09.-".iter().copied().all(is_hostname_byte));
        assert!(!is_hostname_byte(b'_'));
        assert!(!is_hostname_byte(b'/'));
        assert!(!is_hostname_byte(b':'));
    }
}
