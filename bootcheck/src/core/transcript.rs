//! Append-only record of everything read from the console.
//!
//! Chunks keep their arrival order and are never mutated once appended. The
//! prompt watcher only looks at a bounded trailing window, so its scan cost
//! stays independent of how long the session has been running.

/// One read from the console stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based arrival order.
    pub seq: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    chunks: Vec<Chunk>,
    total_bytes: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Empty reads carry no data and are not recorded.
    ///
    /// Returns the sequence number of the stored chunk.
    pub fn append(&mut self, bytes: Vec<u8>) -> Option<usize> {
        if bytes.is_empty() {
            return None;
        }
        let seq = self.chunks.len();
        self.total_bytes += bytes.len();
        self.chunks.push(Chunk { seq, bytes });
        Some(seq)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenation of the last `chunks` chunks.
    pub fn window(&self, chunks: usize) -> Vec<u8> {
        let start = self.chunks.len().saturating_sub(chunks);
        let tail = &self.chunks[start..];
        let mut joined = Vec::with_capacity(tail.iter().map(|chunk| chunk.bytes.len()).sum());
        for chunk in tail {
            joined.extend_from_slice(&chunk.bytes);
        }
        joined
    }

    /// Raw bytes of the whole session.
    pub fn bytes(&self) -> Vec<u8> {
        self.window(self.chunks.len())
    }

    /// Decoded session text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD. Serial consoles emit `\r\n`;
    /// it is folded to `\n` so expectations can be written with plain newlines.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).replace("\r\n", "\n")
    }
}

/// Last `count` lines of `text`.
pub fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(parts: &[&[u8]]) -> Transcript {
        let mut transcript = Transcript::new();
        for part in parts {
            transcript.append(part.to_vec());
        }
        transcript
    }

    #[test]
    fn append_preserves_arrival_order() {
        let transcript = transcript(&[b"boot ", b"done\n", b"# "]);
        let seqs: Vec<usize> = transcript.chunks().iter().map(|chunk| chunk.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(transcript.text(), "boot done\n# ");
        assert_eq!(transcript.total_bytes(), 12);
    }

    #[test]
    fn empty_reads_are_not_recorded() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.append(Vec::new()), None);
        assert!(transcript.is_empty());
        assert_eq!(transcript.append(b"x".to_vec()), Some(0));
    }

    #[test]
    fn window_covers_only_trailing_chunks() {
        let transcript = transcript(&[b"a", b"b", b"c", b"d"]);
        assert_eq!(transcript.window(2), b"cd".to_vec());
        assert_eq!(transcript.window(10), b"abcd".to_vec());
        assert_eq!(transcript.window(0), Vec::<u8>::new());
    }

    #[test]
    fn text_replaces_invalid_utf8() {
        let transcript = transcript(&[b"ok \xff\xfe end"]);
        assert_eq!(transcript.text(), "ok \u{fffd}\u{fffd} end");
    }

    #[test]
    fn text_folds_crlf() {
        let transcript = transcript(&[b"# ls /\r\n", b"dev\r\n# "]);
        assert_eq!(transcript.text(), "# ls /\ndev\n# ");
    }

    #[test]
    fn tail_lines_keeps_last_lines() {
        let text = "one\ntwo\nthree\nfour";
        assert_eq!(tail_lines(text, 2), vec!["three", "four"]);
        assert_eq!(tail_lines(text, 10).len(), 4);
    }
}
