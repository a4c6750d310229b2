/// Function definitions and call sites
///
/// A definition is verified once against its declared contract. Call sites
/// trust the contract and apply it to the caller's stack.
use crate::ast::{Node, ProgramNode, SourceLoc, emit_block, verify_block};
use crate::codegen::{AssemblyContext, primitives};
use crate::error::{ErrorKind, Result};
use crate::typechecker::{Contract, PinRuntimeTypes, TypeStack};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Assembly label of the definition
    pub label: String,
    pub name: String,
    pub contract: Contract,
    /// Whether the signature names its inputs (and the body pins them)
    pub named_inputs: bool,
    pub body: Vec<Node>,
    /// Pin slots allocated while building the body
    pub pinned_slots: Range<usize>,
    pub location: SourceLoc,
}

impl Function {
    /// Verify that the body turns the declared inputs into the declared outputs
    pub fn matches_contract(&self, pins: &mut PinRuntimeTypes) -> Result<()> {
        let mut stack = TypeStack::seeded(&self.contract.inputs, &self.location);
        verify_block(&self.body, &mut stack, pins)?;

        let expected = TypeStack::seeded(&self.contract.outputs, &self.location);
        let diff = expected.diff(&stack);
        if !diff.is_equal() {
            return Err(ErrorKind::ContractViolation {
                function: self.name.clone(),
                expected: expected.to_string(),
                found: stack.to_string(),
                report: diff.report,
            }
            .at(&self.location));
        }
        Ok(())
    }

    /// Emit the callable body
    ///
    /// Entered from a call site with `rsp` on the return stack and the data
    /// stack pointer in `rax`. The function's pin slots are saved on the
    /// return stack for the duration of the call.
    pub fn emit_definition(&self, asm: &mut AssemblyContext<'_>) {
        asm.blank();
        asm.comment(format!("{} {} ({})", self.name, self.contract, self.location));
        asm.label(&self.label);
        for slot in self.pinned_slots.clone() {
            asm.instr(format!("push {}", primitives::slot_operand(slot)));
        }
        asm.instr("mov [ret_stack_rsp], rsp");
        asm.instr("mov rsp, rax");

        emit_block(&self.body, asm);

        asm.instr("mov rax, rsp");
        asm.instr("mov rsp, [ret_stack_rsp]");
        for slot in self.pinned_slots.clone().rev() {
            asm.instr(format!("pop {}", primitives::slot_operand(slot)));
        }
        asm.instr("ret");
    }
}

/// A resolved call to a defined function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub label: String,
    pub name: String,
    pub contract: Contract,
    pub location: SourceLoc,
}

impl ProgramNode for FunctionCall {
    fn location(&self) -> &SourceLoc {
        &self.location
    }

    fn verify(&self, stack: &mut TypeStack, _pins: &mut PinRuntimeTypes) -> Result<()> {
        self.contract.verify(stack, &self.name, &self.location)
    }

    fn emit(&self, asm: &mut AssemblyContext<'_>) {
        asm.comment(format!("call {}", self.name));
        asm.instr("mov rax, rsp");
        asm.instr("mov rsp, [ret_stack_rsp]");
        asm.instr(format!("call {}", self.label));
        asm.instr("mov [ret_stack_rsp], rsp");
        asm.instr("mov rsp, rax");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Typing;
    use crate::ast::{BinaryOp, Op};

    fn loc() -> SourceLoc {
        SourceLoc::new(2, 1, "test.stoat")
    }

    fn function(contract: Contract, body: Vec<Node>) -> Function {
        Function {
            label: "fn_0".to_string(),
            name: "square".to_string(),
            contract,
            named_inputs: false,
            body,
            pinned_slots: 0..0,
            location: loc(),
        }
    }

    #[test]
    fn test_body_honoring_contract() {
        let f = function(
            Contract::new(vec![Typing::NUMBER], vec![Typing::NUMBER]),
            vec![
                Node::instruction(Op::Dup, &loc()),
                Node::instruction(Op::Binary(BinaryOp::Mul), &loc()),
            ],
        );
        f.matches_contract(&mut PinRuntimeTypes::new()).unwrap();
    }

    #[test]
    fn test_contract_violation_names_function() {
        let f = function(
            Contract::new(vec![Typing::NUMBER], vec![Typing::NUMBER]),
            vec![Node::instruction(Op::Dup, &loc())],
        );
        let err = f.matches_contract(&mut PinRuntimeTypes::new()).unwrap_err();
        match err.kind {
            ErrorKind::ContractViolation {
                function,
                expected,
                found,
                ..
            } => {
                assert_eq!(function, "square");
                assert_eq!(expected, "[Number]");
                assert_eq!(found, "[Number, Number]");
            }
            other => panic!("Expected ContractViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_call_site_applies_contract() {
        let call = FunctionCall {
            label: "fn_0".to_string(),
            name: "square".to_string(),
            contract: Contract::new(vec![Typing::NUMBER], vec![Typing::NUMBER]),
            location: loc(),
        };
        let mut pins = PinRuntimeTypes::new();

        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        call.verify(&mut stack, &mut pins).unwrap();
        assert_eq!(stack.len(), 1);

        let mut stack = TypeStack::new();
        let err = call.verify(&mut stack, &mut pins).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::StackUnderflow { .. }));
    }
}
