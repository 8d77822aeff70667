//! Newline-delimited JSON framing.

use crate::error::NetError;
use crate::message::PeerMessage;

/// Upper bound on a single line, so a peer cannot balloon memory with an
/// endless unterminated line. Generous: a full chain response for a large
/// ledger fits well under this.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Encode a message as a single `\n`-terminated line.
pub fn encode_message(message: &PeerMessage) -> Result<String, NetError> {
    let mut line =
        serde_json::to_string(message).map_err(|e| NetError::Serialize(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Parse one line. Malformed or empty lines decode to `None` and are
/// dropped at the call site.
pub fn decode_line(line: &str) -> Option<PeerMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Accumulates raw bytes and yields complete lines.
///
/// The partial tail is carried across reads. When the tail outgrows
/// [`MAX_LINE_BYTES`] without a newline the whole oversize line is
/// dropped, through its eventual terminator.
#[derive(Debug, Default)]
pub struct LineAssembler {
    tail: Vec<u8>,
    discarding: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        LineAssembler::default()
    }

    /// Feed raw bytes, returning every line completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    lines.push(String::from_utf8_lossy(&self.tail).into_owned());
                }
                self.tail.clear();
            } else {
                if self.tail.len() >= MAX_LINE_BYTES {
                    self.tail.clear();
                    self.discarding = true;
                }
                if !self.discarding {
                    self.tail.push(byte);
                }
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_single_line() {
        let line = encode_message(&PeerMessage::RequestChain).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_decode_roundtrip() {
        let line = encode_message(&PeerMessage::Handshake {
            node_id: "n1".into(),
            port: 4000,
        })
        .unwrap();
        let msg = decode_line(&line).unwrap();
        assert!(matches!(msg, PeerMessage::Handshake { .. }));
    }

    #[test]
    fn test_malformed_lines_drop_silently() {
        assert!(decode_line("not json").is_none());
        assert!(decode_line("{\"type\":\"NO_SUCH_KIND\"}").is_none());
        assert!(decode_line("").is_none());
        assert!(decode_line("   ").is_none());
    }

    #[test]
    fn test_assembler_joins_fragmented_reads() {
        let mut assembler = LineAssembler::new();
        let line = encode_message(&PeerMessage::RequestPeers).unwrap();
        let bytes = line.as_bytes();

        let mid = bytes.len() / 2;
        assert!(assembler.push(&bytes[..mid]).is_empty());
        let lines = assembler.push(&bytes[mid..]);
        assert_eq!(lines.len(), 1);
        assert_eq!(decode_line(&lines[0]), Some(PeerMessage::RequestPeers));
    }

    #[test]
    fn test_assembler_splits_batched_reads() {
        let mut assembler = LineAssembler::new();
        let a = encode_message(&PeerMessage::RequestChain).unwrap();
        let b = encode_message(&PeerMessage::RequestPeers).unwrap();
        let lines = assembler.push(format!("{a}{b}").as_bytes());
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_assembler_carries_tail() {
        let mut assembler = LineAssembler::new();
        let lines = assembler.push(b"{\"type\":\"REQUEST_CHAIN\"}\n{\"type\":");
        assert_eq!(lines.len(), 1);
        let lines = assembler.push(b"\"REQUEST_PEERS\"}\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(decode_line(&lines[0]), Some(PeerMessage::RequestPeers));
    }
}
