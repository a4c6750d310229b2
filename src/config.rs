/**
Compiler configuration

Limits and external tools used by the back end. The CLI fills this from
its flags; library callers usually take the defaults.
*/

use crate::ast::pins::DEFAULT_PIN_CAPACITY;

/// Default return stack size in bytes
pub const DEFAULT_RETURN_STACK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Words reserved for pinned values
    pub pin_capacity: usize,
    /// Bytes reserved for the return stack
    pub return_stack_bytes: usize,
    /// Assembler executable (NASM syntax)
    pub assembler: String,
    /// Linker executable
    pub linker: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            pin_capacity: DEFAULT_PIN_CAPACITY,
            return_stack_bytes: DEFAULT_RETURN_STACK_BYTES,
            assembler: "nasm".to_string(),
            linker: "ld".to_string(),
        }
    }
}
