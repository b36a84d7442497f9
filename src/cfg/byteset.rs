use std::fmt::{Debug, Display};

const BYTESET_LEN: usize = 8;

/// Set of bytes, one bit each.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteSet {
    mask: [u32; BYTESET_LEN],
}

pub fn byte_to_string(b: u8) -> String {
    match b {
        b'_' | b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => (b as char).to_string(),
        0x20..=0x7e => format!("{:?}", b as char),
        _ => format!("x{:02x}", b),
    }
}

impl Debug for ByteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ByteSet[{}]", self)
    }
}

impl Display for ByteSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        let mut start: Option<u32> = None;
        for i in 0u32..=256 {
            if i <= 0xff && self.contains(i as u8) {
                start.get_or_insert(i);
                continue;
            }
            if let Some(start) = start.take() {
                if !first {
                    write!(f, ";")?;
                }
                first = false;
                write!(f, "{}", byte_to_string(start as u8))?;
                if i - start > 1 {
                    write!(f, "-{}", byte_to_string((i - 1) as u8))?;
                }
            }
        }
        Ok(())
    }
}

impl ByteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_range(start: u8, end: u8) -> Self {
        let mut set = Self::new();
        for b in start..=end {
            set.add(b);
        }
        set
    }

    pub fn from_bytes(bytes: impl IntoIterator<Item = u8>) -> Self {
        let mut set = Self::new();
        for b in bytes {
            set.add(b);
        }
        set
    }

    pub fn add(&mut self, byte: u8) {
        let idx = byte as usize / 32;
        let bit = byte as usize % 32;
        self.mask[idx] |= 1 << bit;
    }

    pub fn add_set(&mut self, other: &ByteSet) {
        for (mine, theirs) in self.mask.iter_mut().zip(other.mask) {
            *mine |= theirs;
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        let idx = byte as usize / 32;
        let bit = byte as usize % 32;
        self.mask[idx] & (1 << bit) != 0
    }

    pub fn num_bytes(&self) -> usize {
        self.mask.iter().map(|m| m.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|m| *m == 0)
    }

    pub fn single_byte(&self) -> Option<u8> {
        if self.num_bytes() != 1 {
            return None;
        }
        (0..=255u8).find(|b| self.contains(*b))
    }
}
