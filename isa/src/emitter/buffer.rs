/// In-memory sink of emitted instruction words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    words: Vec<u32>,
}

impl CodeBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    pub fn emit(&mut self, word: u32) {
        tracing::trace!(offset = self.position(), "emit {word:#010x}");
        self.words.push(word);
    }

    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of emitted instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Byte offset of the next instruction.
    #[must_use]
    pub fn position(&self) -> usize {
        self.words.len() * 4
    }

    /// Little-endian code bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn little_endian_bytes() {
        let mut buffer = CodeBuffer::new();
        assert!(buffer.is_empty());
        buffer.emit(0xD503_201F);
        buffer.emit(0xD65F_03C0);
        assert_eq!(buffer.position(), 8);
        assert_eq!(
            buffer.to_bytes(),
            vec![0x1F, 0x20, 0x03, 0xD5, 0xC0, 0x03, 0x5F, 0xD6]
        );
        buffer.clear();
        assert_eq!(buffer.len(), 0);
    }
}
