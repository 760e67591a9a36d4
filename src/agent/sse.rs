//! Server-sent event framing.

/// Locate the first event boundary in `buffer`: the index where it starts and
/// the delimiter length. Both `\n\n` and `\r\n\r\n` are accepted; the earlier
/// one wins.
///
/// Works on raw bytes so a chunk that ends inside a multi-byte character is
/// never decoded early.
pub fn find_sse_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let find = |needle: &[u8]| {
        buffer
            .windows(needle.len())
            .position(|window| window == needle)
    };
    let newline = find(b"\n\n").map(|idx| (idx, 2));
    let carriage = find(b"\r\n\r\n").map(|idx| (idx, 4));
    match (newline, carriage) {
        (Some(n), Some(c)) => Some(if n.0 <= c.0 { n } else { c }),
        (boundary, None) | (None, boundary) => boundary,
    }
}

/// Join the `data:` lines of one event. Comments and other fields are
/// skipped; `None` when the event carries no data.
pub fn extract_data_payload(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

/// Incremental splitter over a byte stream of SSE events.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    /// Feed a chunk and return the data payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((idx, len)) = find_sse_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..idx + len).collect();
            if let Some(data) = extract_data_payload(&String::from_utf8_lossy(&event[..idx])) {
                if !data.trim().is_empty() {
                    payloads.push(data);
                }
            }
        }
        payloads
    }

    /// Payload of a trailing event that never got its blank line.
    pub fn finish(self) -> Option<String> {
        extract_data_payload(&String::from_utf8_lossy(&self.buffer)).filter(|data| !data.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_prefers_earliest_delimiter() {
        assert_eq!(find_sse_boundary(b"data: a\n\nrest"), Some((7, 2)));
        assert_eq!(find_sse_boundary(b"data: a\r\n\r\nb\n\n"), Some((7, 4)));
        assert_eq!(find_sse_boundary(b"data: a\n"), None);
    }

    #[test]
    fn payload_merges_data_lines() {
        let event = ": keep-alive\nevent: ping\ndata: {\"a\":1}\ndata: {\"b\":2}\n";
        assert_eq!(
            extract_data_payload(event).as_deref(),
            Some("{\"a\":1}\n{\"b\":2}")
        );
        assert_eq!(extract_data_payload("event: ping"), None);
    }

    #[test]
    fn buffer_handles_split_chunks() {
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(b"event: x\ndata: {\"n\"").is_empty());
        assert_eq!(buffer.push(b":1}\n\ndata: 2\n\nda"), vec!["{\"n\":1}", "2"]);
        assert_eq!(buffer.push(b"ta: 3"), Vec::<String>::new());
        assert_eq!(buffer.finish().as_deref(), Some("3"));
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let event = "data: {\"text\":\"café\"}\n\n".as_bytes();
        let split = event.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut buffer = SseBuffer::default();
        assert!(buffer.push(&event[..split]).is_empty());
        assert_eq!(buffer.push(&event[split..]), vec!["{\"text\":\"café\"}"]);
    }
}
