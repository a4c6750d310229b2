/**
NASM x86-64 code generation

The emitter walks a verified program tree and serializes NASM text for
Linux. It makes no decisions of its own: every label, slot and literal was
fixed while the tree was built.

## Machine model

- The data stack is the native stack (`rsp`).
- The return stack is a separate `.bss` region. Call sites swap `rsp` to it
  around `call`, saving the other pointer in `ret_stack_rsp`.
- Pinned values live in `pins`, addressed as `[r15 + slot*8]`.
- `print_decimal` and `str_equal` are small runtime routines emitted into
  every program.

Example output for `1 2 + print ;`:

```nasm
_start:
    mov r15, pins
    ...
    push 1
    push 2
    pop rbx
    pop rax
    add rax, rbx
    push rax
    pop rdi
    call print_decimal
```
*/

pub mod data;
pub mod error;
pub mod linker;
pub mod primitives;
pub mod runtime;

pub use data::DataSection;
pub use error::{LinkError, LinkResult};
pub use linker::build_executable;

use crate::ast::{Program, emit_block};
use crate::config::CompilerConfig;
use std::fmt::Write as _;

/// Register holding the base address of the pin buffer
pub const PIN_BASE_REGISTER: &str = "r15";

/// Text being emitted, with read access to the data tables
pub struct AssemblyContext<'a> {
    text: String,
    data: &'a DataSection,
}

impl<'a> AssemblyContext<'a> {
    pub fn new(data: &'a DataSection) -> Self {
        AssemblyContext {
            text: String::new(),
            data,
        }
    }

    /// Append one indented instruction
    pub fn instr(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.text, "    {}", line.as_ref());
    }

    pub fn label(&mut self, name: &str) {
        let _ = writeln!(self.text, "{}:", name);
    }

    pub fn comment(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.text, "    ; {}", text.as_ref());
    }

    pub fn blank(&mut self) {
        self.text.push('\n');
    }

    /// Append pre-formatted lines verbatim
    pub fn raw(&mut self, text: &str) {
        self.text.push_str(text);
        if !text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    pub fn data(&self) -> &'a DataSection {
        self.data
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Main code generator
pub struct CodeGen {
    config: CompilerConfig,
}

impl CodeGen {
    pub fn new(config: &CompilerConfig) -> Self {
        CodeGen {
            config: config.clone(),
        }
    }

    /// Emit a complete NASM program
    pub fn compile_program(&self, program: &Program, data: &DataSection) -> String {
        let mut asm = AssemblyContext::new(data);

        asm.raw("; Stoat compiler - generated NASM (x86-64 Linux)");
        asm.raw("bits 64");
        asm.blank();
        asm.raw("section .text");
        asm.raw("global _start");

        for routine in runtime::RUNTIME_ROUTINES {
            tracing::trace!(routine = routine.name, "emitting runtime routine");
            asm.blank();
            asm.comment(routine.description);
            asm.label(routine.name);
            asm.raw(routine.body);
        }

        asm.blank();
        asm.label("_start");
        asm.instr(format!("mov {}, pins", PIN_BASE_REGISTER));
        asm.instr("mov rax, ret_stack_end");
        asm.instr("mov [ret_stack_rsp], rax");
        emit_block(&program.main.body, &mut asm);
        asm.comment("exit(0)");
        asm.instr("mov rax, 60");
        asm.instr("xor rdi, rdi");
        asm.instr("syscall");

        for function in &program.functions {
            tracing::debug!(function = %function.name, label = %function.label, "emitting function");
            function.emit_definition(&mut asm);
        }

        self.emit_rodata(&mut asm);
        self.emit_bss(&mut asm);
        asm.into_text()
    }

    fn emit_rodata(&self, asm: &mut AssemblyContext<'_>) {
        asm.blank();
        asm.raw("section .rodata");
        for literal in asm.data().strings() {
            let bytes = if literal.bytes.is_empty() {
                "0".to_string()
            } else {
                literal
                    .bytes
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            asm.raw(&format!("{}: db {}", literal.label, bytes));
        }
    }

    fn emit_bss(&self, asm: &mut AssemblyContext<'_>) {
        asm.blank();
        asm.raw("section .bss");
        asm.raw(&format!("pins: resq {}", self.config.pin_capacity.max(1)));
        asm.raw("ret_stack_rsp: resq 1");
        asm.raw(&format!("ret_stack: resb {}", self.config.return_stack_bytes));
        asm.raw("ret_stack_end:");
        for memory in asm.data().memories() {
            asm.raw(&format!("{}: resb {} ; {}", memory.label, memory.size.max(1), memory.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Function, Node, Op, SourceLoc};
    use crate::typechecker::Contract;

    fn main_with(body: Vec<Node>) -> Program {
        Program {
            functions: vec![],
            main: Function {
                label: "_start".to_string(),
                name: "main".to_string(),
                contract: Contract::empty(),
                named_inputs: false,
                body,
                pinned_slots: 0..0,
                location: SourceLoc::new(1, 1, "test.stoat"),
            },
        }
    }

    #[test]
    fn test_program_layout() {
        let loc = SourceLoc::new(1, 1, "test.stoat");
        let program = main_with(vec![
            Node::instruction(Op::PushNumber(42), &loc),
            Node::instruction(Op::Print, &loc),
        ]);
        let asm = CodeGen::new(&CompilerConfig::default()).compile_program(&program, &DataSection::default());

        assert!(asm.contains("bits 64"));
        assert!(asm.contains("global _start"));
        assert!(asm.contains("print_decimal:"));
        assert!(asm.contains("str_equal:"));
        assert!(asm.contains("    push 42\n"));
        assert!(asm.contains("    call print_decimal\n"));
        assert!(asm.contains("pins: resq 4096"));
        assert!(asm.contains("ret_stack_end:"));

        let text = asm.find("section .text").unwrap();
        let rodata = asm.find("section .rodata").unwrap();
        let bss = asm.find("section .bss").unwrap();
        assert!(text < rodata && rodata < bss);
    }

    #[test]
    fn test_literals_and_memories() {
        let mut data = DataSection::default();
        data.add_string(b"hi\n".to_vec());
        data.add_memory("buffer", 32);
        let asm = CodeGen::new(&CompilerConfig::default()).compile_program(&main_with(vec![]), &data);

        assert!(asm.contains("str_0: db 104, 105, 10"));
        assert!(asm.contains("mem_0: resb 32 ; buffer"));
    }
}
