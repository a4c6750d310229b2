/// Conditional execution
///
/// `if <yes> ;`, `if <yes> else <no> ;` and `if else <no> ;`. The arms of a
/// branch must agree on the stack shape they leave behind.
use crate::ast::{Node, ProgramNode, SourceLoc, emit_block, verify_block};
use crate::ast::types::Typing;
use crate::codegen::AssemblyContext;
use crate::error::{ErrorKind, Result};
use crate::typechecker::{PinRuntimeTypes, TypeStack};

/// The arms present on a branch
#[derive(Debug, Clone, PartialEq)]
pub enum Arms {
    /// Runs only when the condition is non-zero
    Yes(Vec<Node>),
    /// Runs only when the condition is zero
    No(Vec<Node>),
    Both(Vec<Node>, Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branching {
    pub arms: Arms,
    /// Unique id for the jump labels
    pub label: usize,
    pub location: SourceLoc,
}

impl Branching {
    fn else_label(&self) -> String {
        format!("if_{}_else", self.label)
    }

    fn end_label(&self) -> String {
        format!("if_{}_end", self.label)
    }
}

impl ProgramNode for Branching {
    fn location(&self) -> &SourceLoc {
        &self.location
    }

    fn verify(&self, stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()> {
        stack.pop_expecting("if", &Typing::NUMBER, &self.location)?;

        match &self.arms {
            Arms::Yes(body) | Arms::No(body) => {
                let before = stack.clone();
                verify_block(body, stack, pins)?;
                let diff = before.diff(stack);
                if !diff.is_equal() {
                    return Err(ErrorKind::BranchShapeViolation {
                        message: format!(
                            "a single-armed `if` must leave the stack unchanged: {} word(s) {} before, {} word(s) {} after",
                            before.len(),
                            before,
                            stack.len(),
                            stack
                        ),
                        report: diff.report,
                    }
                    .at(&self.location));
                }
            }
            Arms::Both(yes, no) => {
                let mut yes_stack = stack.clone();
                let mut no_stack = stack.clone();
                verify_block(yes, &mut yes_stack, pins)?;
                verify_block(no, &mut no_stack, pins)?;
                let diff = yes_stack.diff(&no_stack);
                if !diff.is_equal() {
                    return Err(ErrorKind::BranchShapeViolation {
                        message: format!(
                            "`if` arms disagree: yes leaves {} word(s) {}, else leaves {} word(s) {}",
                            yes_stack.len(),
                            yes_stack,
                            no_stack.len(),
                            no_stack
                        ),
                        report: diff.report,
                    }
                    .at(&self.location));
                }
                *stack = yes_stack;
            }
        }
        Ok(())
    }

    fn emit(&self, asm: &mut AssemblyContext<'_>) {
        let end = self.end_label();
        asm.comment(format!("if ({})", self.location));
        asm.instr("pop rax");
        asm.instr("test rax, rax");

        match &self.arms {
            Arms::Yes(body) => {
                asm.instr(format!("jz {}", end));
                emit_block(body, asm);
            }
            Arms::No(body) => {
                asm.instr(format!("jnz {}", end));
                emit_block(body, asm);
            }
            Arms::Both(yes, no) => {
                let otherwise = self.else_label();
                asm.instr(format!("jz {}", otherwise));
                emit_block(yes, asm);
                asm.instr(format!("jmp {}", end));
                asm.label(&otherwise);
                emit_block(no, asm);
            }
        }
        asm.label(&end);
    }
}
