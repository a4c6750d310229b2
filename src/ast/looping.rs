/// Counted and conditional loops
///
/// `<seed> loop i <condition> do <body> ;` pins the seed as the iterator,
/// evaluates the condition with the iterator on top, and runs the body while
/// it is non-zero. The body leaves the next iterator value on top. After the
/// loop the final iterator value is pushed once more.
use crate::ast::instruction::{bind_pin, push_pinned, release_pin, update_pin};
use crate::ast::pins::PinnedItem;
use crate::ast::types::Typing;
use crate::ast::{Node, ProgramNode, SourceLoc, emit_block, verify_block};
use crate::codegen::{AssemblyContext, primitives};
use crate::error::{ErrorKind, Result};
use crate::typechecker::{PinRuntimeTypes, StackDiffKind, TypeStack};

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub iterator: PinnedItem,
    pub condition: Vec<Node>,
    pub body: Vec<Node>,
    /// Unique id for the jump labels
    pub label: usize,
    pub location: SourceLoc,
}

impl Loop {
    fn shape_violation(&self, message: String, report: String) -> crate::error::Error {
        ErrorKind::LoopShapeViolation { message, report }.at(&self.location)
    }
}

impl ProgramNode for Loop {
    fn location(&self) -> &SourceLoc {
        &self.location
    }

    fn verify(&self, stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()> {
        let loc = &self.location;
        bind_pin(&self.iterator, stack, pins, loc)?;
        let snapshot = stack.clone();

        push_pinned(&self.iterator, stack, pins, loc)?;
        verify_block(&self.condition, stack, pins)?;
        stack.pop_expecting("loop condition", &Typing::NUMBER, loc)?;
        let diff = snapshot.diff(stack);
        if !diff.is_equal() {
            return Err(self.shape_violation(
                format!(
                    "loop condition must consume the iterator and leave one Number: expected {} before the result, found {}",
                    snapshot, stack
                ),
                diff.report,
            ));
        }

        verify_block(&self.body, stack, pins)?;
        let mut expected = snapshot.clone();
        push_pinned(&self.iterator, &mut expected, pins, loc)?;
        let diff = expected.diff(stack);
        match diff.verdict {
            StackDiffKind::Equal => {}
            StackDiffKind::SizeDifference => {
                return Err(self.shape_violation(
                    format!(
                        "loop body must leave exactly the next `{}` on top: expected {} word(s), found {}",
                        self.iterator.name,
                        expected.len(),
                        stack.len()
                    ),
                    diff.report,
                ));
            }
            StackDiffKind::TypeDifference => {
                return Err(self.shape_violation(
                    format!(
                        "loop body changes the stack types: expected {}, found {}",
                        expected, stack
                    ),
                    diff.report,
                ));
            }
        }

        update_pin(&self.iterator, stack, pins, loc)?;
        push_pinned(&self.iterator, stack, pins, loc)?;
        release_pin(&self.iterator, pins);
        Ok(())
    }

    fn emit(&self, asm: &mut AssemblyContext<'_>) {
        let start = format!("loop_{}_start", self.label);
        let end = format!("loop_{}_end", self.label);

        asm.comment(format!("loop {} ({})", self.iterator.name, self.location));
        primitives::emit_pin_store(&self.iterator, asm);
        asm.label(&start);
        primitives::emit_pin_push(&self.iterator, asm);
        emit_block(&self.condition, asm);
        asm.instr("pop rax");
        asm.instr("test rax, rax");
        asm.instr(format!("jz {}", end));
        emit_block(&self.body, asm);
        primitives::emit_pin_store(&self.iterator, asm);
        asm.instr(format!("jmp {}", start));
        asm.label(&end);
        primitives::emit_pin_push(&self.iterator, asm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Op};

    fn loc() -> SourceLoc {
        SourceLoc::new(5, 1, "test.stoat")
    }

    fn op(op: Op) -> Node {
        Node::instruction(op, &loc())
    }

    fn iterator() -> PinnedItem {
        PinnedItem {
            name: "i".to_string(),
            typing: Typing::NUMBER,
            slot: 0,
        }
    }

    /// `0 loop i 10 < do i 1 + ;`
    fn counting_loop(body: Vec<Node>) -> Loop {
        Loop {
            iterator: iterator(),
            condition: vec![op(Op::PushNumber(10)), op(Op::Binary(BinaryOp::Lt))],
            body,
            label: 0,
            location: loc(),
        }
    }

    fn check(node: &Loop, stack: &mut TypeStack) -> Result<()> {
        node.verify(stack, &mut PinRuntimeTypes::new())
    }

    #[test]
    fn test_counting_loop_leaves_iterator() {
        let node = counting_loop(vec![
            op(Op::PushPinned(iterator())),
            op(Op::PushNumber(1)),
            op(Op::Binary(BinaryOp::Add)),
        ]);
        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        check(&node, &mut stack).unwrap();
        assert_eq!(stack.to_string(), "[Number]");
    }

    #[test]
    fn test_body_must_produce_next_value() {
        let node = counting_loop(vec![]);
        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        let err = check(&node, &mut stack).unwrap_err();
        match err.kind {
            ErrorKind::LoopShapeViolation { message, .. } => {
                assert!(message.contains("expected 1 word(s), found 0"));
            }
            other => panic!("Expected LoopShapeViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_body_leaving_extra_value_is_rejected() {
        let node = counting_loop(vec![
            op(Op::PushPinned(iterator())),
            op(Op::PushNumber(1)),
            op(Op::Binary(BinaryOp::Add)),
            op(Op::PushNumber(2)),
        ]);
        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        let err = check(&node, &mut stack).unwrap_err();
        match err.kind {
            ErrorKind::LoopShapeViolation { message, .. } => {
                assert!(message.contains("expected 1 word(s), found 2"));
            }
            other => panic!("Expected LoopShapeViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_body_type_change_is_rejected() {
        let node = counting_loop(vec![op(Op::PushCStr { label: "str_0".into() })]);
        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        let err = check(&node, &mut stack).unwrap_err();
        match err.kind {
            ErrorKind::LoopShapeViolation { message, .. } => {
                assert!(message.contains("changes the stack types"));
            }
            other => panic!("Expected LoopShapeViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_must_consume_iterator() {
        let node = Loop {
            iterator: iterator(),
            condition: vec![op(Op::PushNumber(1))],
            body: vec![op(Op::PushPinned(iterator()))],
            label: 0,
            location: loc(),
        };
        let mut stack = TypeStack::seeded(&[Typing::NUMBER], &loc());
        let err = check(&node, &mut stack).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::LoopShapeViolation { .. }));
    }

    #[test]
    fn test_seed_must_match_iterator() {
        let node = counting_loop(vec![op(Op::PushPinned(iterator()))]);
        let mut stack = TypeStack::seeded(&[Typing::POINTER], &loc());
        let err = check(&node, &mut stack).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }
}
