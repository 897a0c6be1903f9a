//! Reusable byte buffer for materialized lines.

use bstr::{BStr, ByteSlice};

/// A growable byte buffer with a valid-length marker.
///
/// The line scanner reads every line of a chunk into one `ByteSpan`, growing
/// the backing storage only when a line is longer than anything seen before.
/// `len` marks how many bytes of the backing storage are valid for the
/// current line; bytes past it are stale leftovers from earlier lines.
#[derive(Debug, Default)]
pub struct ByteSpan {
    buf: Vec<u8>,
    len: usize,
}

impl ByteSpan {
    /// Create an empty span with no backing storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the backing storage can hold `size` bytes and return it as a
    /// writable slice. Growing invalidates the current contents.
    pub fn require_size(&mut self, size: usize) -> &mut [u8] {
        if self.buf.len() < size {
            self.len = 0;
            self.buf.resize(size, 0);
        }
        &mut self.buf[..size]
    }

    /// Mark the first `len` bytes of the backing storage as valid.
    ///
    /// # Panics
    /// Panics if `len` exceeds the backing storage.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.buf.len(), "valid length exceeds backing storage");
        self.len = len;
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the span holds no valid bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The valid bytes as a byte string, for display and lossy conversion.
    pub fn as_bstr(&self) -> &BStr {
        self.bytes().as_bstr()
    }
}
