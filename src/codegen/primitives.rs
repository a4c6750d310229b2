/**
Primitive operations

Instruction sequences for the builtin words:
- Stack operations: dup, drop, swap, over, rot
- Arithmetic and bitwise: + - * / % & | ^ << >>
- Comparisons: = != < > <= >=, plus `not` and `streq`
- Memory: @ ! @8 !8, structure loads/stores and field offsets
- Syscalls and pins

Binary operators pop the right operand into `rbx` and the left into `rax`.
*/

use super::{AssemblyContext, PIN_BASE_REGISTER};
use crate::ast::pins::PinnedItem;
use crate::ast::types::WORD_SIZE;
use crate::ast::{Access, BinaryOp, Op};

/// Syscall argument registers, first argument first
const SYSCALL_REGISTERS: [&str; 6] = ["rdi", "rsi", "rdx", "r10", "r8", "r9"];

/// Emit the instructions for one primitive operation
pub fn emit_op(op: &Op, asm: &mut AssemblyContext<'_>) {
    match op {
        Op::PushNumber(n) => push_immediate(*n, asm),
        Op::PushBool(b) => asm.instr(format!("push {}", u8::from(*b))),
        Op::PushStr { label, len } => {
            push_immediate(*len as i64, asm);
            push_address(label, asm);
        }
        Op::PushCStr { label } | Op::PushMemory { label, .. } => push_address(label, asm),

        // Stack operations
        Op::Dup => asm.instr("push qword [rsp]"),
        Op::Drop => asm.instr("add rsp, 8"),
        Op::Swap => {
            asm.instr("pop rax");
            asm.instr("pop rbx");
            asm.instr("push rax");
            asm.instr("push rbx");
        }
        Op::Over => asm.instr("push qword [rsp + 8]"),
        Op::Rot => {
            asm.instr("pop rcx");
            asm.instr("pop rbx");
            asm.instr("pop rax");
            asm.instr("push rbx");
            asm.instr("push rcx");
            asm.instr("push rax");
        }

        Op::Print => {
            asm.instr("pop rdi");
            asm.instr("call print_decimal");
        }
        Op::Binary(op) => emit_binary(*op, asm),
        Op::Not => {
            asm.instr("pop rax");
            asm.instr("test rax, rax");
            asm.instr("sete al");
            asm.instr("movzx rax, al");
            asm.instr("push rax");
        }
        Op::StrEq => {
            asm.instr("pop rsi");
            asm.instr("pop rdx");
            asm.instr("pop rdi");
            asm.instr("pop rcx");
            asm.instr("call str_equal");
            asm.instr("push rax");
        }

        // Memory
        Op::Load(access) => {
            asm.instr("pop rax");
            match access {
                Access::Word => asm.instr("push qword [rax]"),
                Access::Byte => {
                    asm.instr("movzx rbx, byte [rax]");
                    asm.instr("push rbx");
                }
                Access::Struct(structure) => {
                    for field in &structure.fields {
                        asm.instr(format!("push qword [rax + {}]", field.offset));
                    }
                }
            }
        }
        Op::Store(access) => {
            asm.instr("pop rax");
            match access {
                Access::Word => {
                    asm.instr("pop rbx");
                    asm.instr("mov [rax], rbx");
                }
                Access::Byte => {
                    asm.instr("pop rbx");
                    asm.instr("mov [rax], bl");
                }
                Access::Struct(structure) => {
                    for field in structure.fields.iter().rev() {
                        asm.instr(format!("pop qword [rax + {}]", field.offset));
                    }
                }
            }
        }
        Op::FieldOffset { field, .. } => {
            if field.offset != 0 {
                asm.instr(format!("add qword [rsp], {}", field.offset));
            }
        }

        Op::Syscall(count) => {
            asm.instr("pop rax");
            for register in &SYSCALL_REGISTERS[..*count] {
                asm.instr(format!("pop {}", register));
            }
            asm.instr("syscall");
            asm.instr("push rax");
        }
        Op::Cast(_) => {}

        Op::Pin(item) | Op::UpdatePinned(item) => emit_pin_store(item, asm),
        Op::PushPinned(item) => emit_pin_push(item, asm),
        Op::Unpin(_) => {}
    }
}

fn push_immediate(value: i64, asm: &mut AssemblyContext<'_>) {
    if i32::try_from(value).is_ok() {
        asm.instr(format!("push {}", value));
    } else {
        asm.instr(format!("mov rax, {}", value));
        asm.instr("push rax");
    }
}

fn push_address(label: &str, asm: &mut AssemblyContext<'_>) {
    asm.instr(format!("mov rax, {}", label));
    asm.instr("push rax");
}

fn emit_binary(op: BinaryOp, asm: &mut AssemblyContext<'_>) {
    asm.instr("pop rbx");
    asm.instr("pop rax");
    match op {
        BinaryOp::Add => asm.instr("add rax, rbx"),
        BinaryOp::Sub => asm.instr("sub rax, rbx"),
        BinaryOp::Mul => asm.instr("imul rax, rbx"),
        BinaryOp::Div | BinaryOp::Mod => {
            asm.instr("cqo");
            asm.instr("idiv rbx");
            if op == BinaryOp::Mod {
                asm.instr("mov rax, rdx");
            }
        }
        BinaryOp::And => asm.instr("and rax, rbx"),
        BinaryOp::Or => asm.instr("or rax, rbx"),
        BinaryOp::Xor => asm.instr("xor rax, rbx"),
        BinaryOp::Shl | BinaryOp::Shr => {
            asm.instr("mov rcx, rbx");
            asm.instr(if op == BinaryOp::Shl { "shl rax, cl" } else { "shr rax, cl" });
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let set = match op {
                BinaryOp::Eq => "sete",
                BinaryOp::Ne => "setne",
                BinaryOp::Lt => "setl",
                BinaryOp::Gt => "setg",
                BinaryOp::Le => "setle",
                _ => "setge",
            };
            asm.instr("cmp rax, rbx");
            asm.instr(format!("{} al", set));
            asm.instr("movzx rax, al");
        }
    }
    asm.instr("push rax");
}

pub(crate) fn slot_operand(slot: usize) -> String {
    format!("qword [{} + {}]", PIN_BASE_REGISTER, slot * WORD_SIZE)
}

/// Pop the top value into a pin's slots, last word first
pub fn emit_pin_store(item: &PinnedItem, asm: &mut AssemblyContext<'_>) {
    for slot in item.slots().rev() {
        asm.instr(format!("pop {}", slot_operand(slot)));
    }
}

/// Push a pinned value back onto the data stack
pub fn emit_pin_push(item: &PinnedItem, asm: &mut AssemblyContext<'_>) {
    for slot in item.slots() {
        asm.instr(format!("push {}", slot_operand(slot)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{PrimitiveKind, Structure, Typing};
    use crate::codegen::DataSection;
    use std::rc::Rc;

    fn emit(op: Op) -> String {
        let data = DataSection::default();
        let mut asm = AssemblyContext::new(&data);
        emit_op(&op, &mut asm);
        asm.into_text()
    }

    fn lines(text: &str) -> Vec<&str> {
        text.lines().map(str::trim).collect()
    }

    #[test]
    fn test_large_immediates_go_through_rax() {
        assert_eq!(lines(&emit(Op::PushNumber(-7))), ["push -7"]);
        assert_eq!(
            lines(&emit(Op::PushNumber(1 << 40))),
            ["mov rax, 1099511627776", "push rax"]
        );
    }

    #[test]
    fn test_comparison_sets_flag() {
        assert_eq!(
            lines(&emit(Op::Binary(BinaryOp::Le))),
            ["pop rbx", "pop rax", "cmp rax, rbx", "setle al", "movzx rax, al", "push rax"]
        );
    }

    #[test]
    fn test_modulo_pushes_remainder() {
        let text = emit(Op::Binary(BinaryOp::Mod));
        assert!(text.contains("idiv rbx"));
        assert!(text.contains("mov rax, rdx"));
    }

    #[test]
    fn test_syscall_register_order() {
        assert_eq!(
            lines(&emit(Op::Syscall(3))),
            ["pop rax", "pop rdi", "pop rsi", "pop rdx", "syscall", "push rax"]
        );
    }

    #[test]
    fn test_struct_store_pops_last_field_first() {
        let pair = Rc::new(Structure::new(
            "Pair",
            &[("a", PrimitiveKind::Number), ("b", PrimitiveKind::Number)],
        ));
        assert_eq!(
            lines(&emit(Op::Store(Access::Struct(pair)))),
            ["pop rax", "pop qword [rax + 8]", "pop qword [rax + 0]"]
        );
    }

    #[test]
    fn test_pin_slots_are_addressed_from_base() {
        let item = PinnedItem {
            name: "s".to_string(),
            typing: Typing::string(),
            slot: 3,
        };
        assert_eq!(
            lines(&emit(Op::Pin(item.clone()))),
            ["pop qword [r15 + 32]", "pop qword [r15 + 24]"]
        );
        assert_eq!(
            lines(&emit(Op::PushPinned(item))),
            ["push qword [r15 + 24]", "push qword [r15 + 32]"]
        );
    }
}
