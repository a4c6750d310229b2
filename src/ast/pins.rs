/// Pin registry
///
/// Pins bind names to top-of-stack values. Each pin owns a run of word slots
/// in a fixed scratch buffer, addressed from the pin base register. Slots are
/// handed out once, at construction time, by a monotonic counter and are
/// never reused, so verification and emission always agree on addressing.
use crate::ast::types::Typing;
use crate::error::ErrorKind;
use std::collections::HashMap;

/// Default size of the pin scratch buffer, in words
pub const DEFAULT_PIN_CAPACITY: usize = 4096;

/// A name bound to a slot run
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedItem {
    pub name: String,
    pub typing: Typing,
    /// First word slot; the value occupies `typing.words()` consecutive slots
    pub slot: usize,
}

impl PinnedItem {
    /// Slots occupied by this pin, first word first
    pub fn slots(&self) -> std::ops::Range<usize> {
        self.slot..self.slot + self.typing.words()
    }
}

/// Scoped-shadowing map from names to pins
#[derive(Debug)]
pub struct PinRegistry {
    scopes: HashMap<String, Vec<PinnedItem>>,
    next_slot: usize,
    capacity: usize,
}

impl PinRegistry {
    pub fn new(capacity: usize) -> Self {
        PinRegistry {
            scopes: HashMap::new(),
            next_slot: 0,
            capacity,
        }
    }

    /// Pin `name`, shadowing any visible pin with the same name
    pub fn pin(&mut self, name: &str, typing: Typing) -> Result<PinnedItem, ErrorKind> {
        let words = typing.words();
        if self.next_slot + words > self.capacity {
            return Err(ErrorKind::PinStorageExhausted {
                name: name.to_string(),
                requested: words,
                capacity: self.capacity,
            });
        }

        let item = PinnedItem {
            name: name.to_string(),
            typing,
            slot: self.next_slot,
        };
        self.next_slot += words;
        self.scopes
            .entry(name.to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    /// End the innermost binding of `name`, making the outer one visible again
    pub fn unpin(&mut self, name: &str) -> Option<PinnedItem> {
        let stack = self.scopes.get_mut(name)?;
        let item = stack.pop();
        if stack.is_empty() {
            self.scopes.remove(name);
        }
        item
    }

    /// The innermost visible pin for `name`
    pub fn lookup(&self, name: &str) -> Option<&PinnedItem> {
        self.scopes.get(name).and_then(|stack| stack.last())
    }

    /// Next slot the counter will hand out
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PinRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_CAPACITY)
    }
}
