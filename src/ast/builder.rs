/// Construction-time state
///
/// All counters and tables that grow while the program tree is built live
/// here: pin slots, jump labels, string literals and memories. The parser
/// holds the only `Builder`; `finish` hands the data tables over to the
/// emitter.
use crate::ast::SourceLoc;
use crate::ast::pins::{PinRegistry, PinnedItem};
use crate::ast::types::Typing;
use crate::codegen::data::DataSection;
use crate::config::CompilerConfig;
use crate::error::Result;

#[derive(Debug)]
pub struct Builder {
    pins: PinRegistry,
    next_label: usize,
    data: DataSection,
}

impl Builder {
    pub fn new(config: &CompilerConfig) -> Self {
        Builder {
            pins: PinRegistry::new(config.pin_capacity),
            next_label: 0,
            data: DataSection::default(),
        }
    }

    pub fn pin(&mut self, name: &str, typing: Typing, location: &SourceLoc) -> Result<PinnedItem> {
        let item = self.pins.pin(name, typing).map_err(|kind| kind.at(location))?;
        tracing::trace!(name, slot = item.slot, typing = %item.typing, "pinned");
        Ok(item)
    }

    pub fn unpin(&mut self, name: &str) -> Option<PinnedItem> {
        self.pins.unpin(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&PinnedItem> {
        self.pins.lookup(name)
    }

    pub fn next_slot(&self) -> usize {
        self.pins.next_slot()
    }

    /// Fresh id for branch and loop labels
    pub fn next_label(&mut self) -> usize {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    /// Intern a `str` literal, returning its label
    pub fn add_string(&mut self, bytes: Vec<u8>) -> String {
        self.data.add_string(bytes)
    }

    /// Intern a null-terminated literal, returning its label
    pub fn add_cstring(&mut self, mut bytes: Vec<u8>) -> String {
        bytes.push(0);
        self.data.add_string(bytes)
    }

    /// Reserve a named zeroed region, returning its label
    pub fn add_memory(&mut self, name: &str, size: usize) -> String {
        self.data.add_memory(name, size)
    }

    pub fn finish(self) -> DataSection {
        self.data
    }
}
