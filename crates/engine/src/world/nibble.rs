/// Packed array of 4-bit values, two per byte, low nibble first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NibbleArray {
    bytes: Box<[u8]>,
}

impl NibbleArray {
    /// An array holding `len` nibbles, all zero. `len` must be even.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len / 2].into_boxed_slice(),
        }
    }

    /// Wrap raw bytes, e.g. from a persisted chunk. Returns `None` when the
    /// byte count does not match `len` nibbles.
    pub fn from_bytes(bytes: Vec<u8>, len: usize) -> Option<Self> {
        (bytes.len() == len / 2).then(|| Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        let byte = self.bytes[index >> 1];
        if index & 1 == 0 { byte & 0xF } else { byte >> 4 }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        let byte = &mut self.bytes[index >> 1];
        let v = value & 0xF;
        if index & 1 == 0 {
            *byte = (*byte & 0xF0) | v;
        } else {
            *byte = (*byte & 0x0F) | (v << 4);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of nibbles held.
    pub fn len(&self) -> usize {
        self.bytes.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
