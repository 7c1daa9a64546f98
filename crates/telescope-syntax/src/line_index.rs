//! Line-start offset cache for offset/position conversion.

/// Ascending array of line-start byte offsets for one document.
///
/// Positions are `(line, column)` pairs, zero-based, with columns measured in
/// bytes. Encoding conversion for the wire (UTF-16 code units) is the
/// transport layer's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Builds the index for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx as u32 + 1);
            }
        }
        Self {
            line_starts,
            len: text.len() as u32,
        }
    }

    /// Number of lines (at least 1, even for empty text).
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Converts a byte offset to a `(line, column)` pair.
    ///
    /// Offsets past the end of the text clamp to the final position.
    #[must_use]
    pub fn position(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line as u32, offset - self.line_starts[line])
    }

    /// Converts a `(line, column)` pair back to a byte offset.
    ///
    /// Out-of-range lines clamp to the end of the text.
    #[must_use]
    pub fn offset(&self, line: u32, column: u32) -> u32 {
        let Some(start) = self.line_starts.get(line as usize) else {
            return self.len;
        };
        let line_end = self
            .line_starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or(self.len);
        (start + column).min(line_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_roundtrip() {
        let text = "openapi: 3.1.0\ninfo:\n  title: t\n";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 4);

        assert_eq!(index.position(0), (0, 0));
        assert_eq!(index.position(9), (0, 9));
        assert_eq!(index.position(15), (1, 0));
        assert_eq!(index.position(23), (2, 2));

        assert_eq!(index.offset(1, 0), 15);
        assert_eq!(index.offset(2, 2), 23);
    }

    #[test]
    fn clamps_out_of_range() {
        let index = LineIndex::new("ab");
        assert_eq!(index.position(99), (0, 2));
        assert_eq!(index.offset(7, 7), 2);
    }

    #[test]
    fn empty_text_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.line_count(), 1);
        assert_eq!(index.position(0), (0, 0));
    }
}
