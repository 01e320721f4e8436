use crate::parser::span::Span;

/// Byte offset to line lookup for one source file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Offset of the start of each line.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &[u8]) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(memchr::memchr_iter(b'\n', source).map(|i| i + 1));
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Returns (line, column) for a given byte offset.
    /// Both line and column are 0-based.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        match self.line_starts.binary_search(&offset) {
            Ok(line) => (line, 0),
            Err(insert_idx) => {
                let line = insert_idx - 1;
                (line, offset - self.line_starts[line])
            }
        }
    }

    /// 1-based line number of a byte offset, as reported by reflection.
    pub fn line(&self, offset: usize) -> usize {
        self.line_col(offset).0 + 1
    }

    /// 1-based (start, end) lines of a span. The end offset is exclusive.
    pub fn lines(&self, span: Span) -> (usize, usize) {
        let end = if span.end > span.start {
            span.end - 1
        } else {
            span.end
        };
        (self.line(span.start), self.line(end))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lookup() {
        let index = LineIndex::new(b"<?php\nclass A\n{\n}\n");
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(6), 2);
        assert_eq!(index.line(14), 3);
        assert_eq!(index.lines(Span::new(6, 18)), (2, 4));
        assert_eq!(index.line_count(), 5);
    }
}
