/// Byte offset → line/column lookup for one source text.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Zero-based `(line, column)` for `offset`, with the column counted in
    /// UTF-16 code units as source maps expect.
    pub fn position(&self, offset: u32, source: &str) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            // offset before the first line start
            Err(0) => 0,
            Err(idx) => idx - 1,
        };

        let line_start = self.line_starts[line_idx] as usize;
        let end = (offset as usize).min(source.len());
        let column = source
            .get(line_start..end)
            .map(|text| text.encode_utf16().count() as u32)
            .unwrap_or(0);

        (line_idx as u32, column)
    }

    /// One-based line and zero-based column, the diagnostic convention.
    pub fn line_column(&self, offset: u32, source: &str) -> (u32, u32) {
        let (line, column) = self.position(offset, source);
        (line + 1, column)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
