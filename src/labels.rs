/// Maps template catalog indexes to the digit each template depicts.
///
/// A catalog may hold several visual variants of one digit, so many indexes
/// can share a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<u8>,
}

/// Digit for each of the 44 templates shipped with the InBody catalog.
pub const INBODY_LABELS: [u8; 44] = [
    2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 4, 4, 5, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 7, 7, 7, 7,
    8, 8, 8, 8, 8, 8, 8, 8, 9, 0, 0, 1, 1,
];

impl LabelTable {
    pub fn new(labels: Vec<u8>) -> Self {
        Self { labels }
    }

    pub fn inbody() -> Self {
        Self::new(INBODY_LABELS.to_vec())
    }

    /// Digit for a catalog index; `None` past the end of the table.
    pub fn digit(&self, index: usize) -> Option<u8> {
        self.labels.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::inbody()
    }
}
