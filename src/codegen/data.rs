/**
Data tables

String literals go to `.rodata`, named memories to `.bss`. Both tables are
filled while the program is built and only read during emission.
*/

/// A literal's bytes with escapes already expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// A named, zero-initialised region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    pub label: String,
    pub name: String,
    /// Size in bytes
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSection {
    strings: Vec<StringLiteral>,
    memories: Vec<Memory>,
}

impl DataSection {
    /// Add a literal, reusing an identical one when present
    pub(crate) fn add_string(&mut self, bytes: Vec<u8>) -> String {
        if let Some(existing) = self.strings.iter().find(|s| s.bytes == bytes) {
            return existing.label.clone();
        }
        let label = format!("str_{}", self.strings.len());
        self.strings.push(StringLiteral {
            label: label.clone(),
            bytes,
        });
        label
    }

    pub(crate) fn add_memory(&mut self, name: &str, size: usize) -> String {
        let label = format!("mem_{}", self.memories.len());
        self.memories.push(Memory {
            label: label.clone(),
            name: name.to_string(),
            size,
        });
        label
    }

    pub fn strings(&self) -> &[StringLiteral] {
        &self.strings
    }

    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_literals_share_a_label() {
        let mut data = DataSection::default();
        let a = data.add_string(b"hello".to_vec());
        let b = data.add_string(b"world".to_vec());
        let c = data.add_string(b"hello".to_vec());
        assert_eq!(a, "str_0");
        assert_eq!(b, "str_1");
        assert_eq!(a, c);
        assert_eq!(data.strings().len(), 2);
    }

    #[test]
    fn test_memories_get_sequential_labels() {
        let mut data = DataSection::default();
        assert_eq!(data.add_memory("buf", 64), "mem_0");
        assert_eq!(data.add_memory("buf2", 8), "mem_1");
        assert_eq!(data.memories()[0].size, 64);
    }
}
