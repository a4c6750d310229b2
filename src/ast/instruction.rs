/// Primitive instructions
///
/// Fixed-shape operations verify through a literal [`Contract`]. Operations
/// whose shape depends on their operands (stack shuffles, pointer arithmetic,
/// loads and stores, syscalls, pins) carry a custom rule instead.
use crate::ast::pins::PinnedItem;
use crate::ast::types::{Field, PrimitiveKind, Structure, Typing};
use crate::ast::{ProgramNode, SourceLoc};
use crate::codegen::{AssemblyContext, primitives};
use crate::error::{ErrorKind, Result};
use crate::typechecker::{Contract, PinRuntimeTypes, StackEntry, TypeStack};
use std::rc::Rc;

/// Maximum number of syscall arguments
pub const MAX_SYSCALL_ARGS: usize = 6;

/// Two-operand integer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn from_symbol(word: &str) -> Option<Self> {
        let op = match word {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "&" => BinaryOp::And,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "=" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            _ => return None,
        };
        Some(op)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }
}

/// Granularity of a load or store
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// One 64-bit word
    Word,
    /// One byte, zero-extended on load
    Byte,
    /// Every field of a structure
    Struct(Rc<Structure>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    PushNumber(i64),
    PushBool(bool),
    /// Push a `str` literal: length, then start
    PushStr { label: String, len: usize },
    /// Push a pointer to a null-terminated literal
    PushCStr { label: String },
    /// Push the address of a named memory
    PushMemory { label: String, typing: Typing },
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Print,
    Binary(BinaryOp),
    Not,
    StrEq,
    Load(Access),
    Store(Access),
    /// Advance a structure pointer to one of its fields
    FieldOffset { structure: Rc<Structure>, field: Field },
    Syscall(usize),
    /// Reinterpret the top word as another kind
    Cast(PrimitiveKind),
    /// Pop the top value into its pin slots
    Pin(PinnedItem),
    Unpin(PinnedItem),
    PushPinned(PinnedItem),
    /// Replace a pinned value with the top of the stack
    UpdatePinned(PinnedItem),
}

impl Op {
    /// Look up a builtin word
    pub fn builtin(word: &str) -> Option<Op> {
        if let Some(op) = BinaryOp::from_symbol(word) {
            return Some(Op::Binary(op));
        }
        if let Some(count) = word.strip_prefix("syscall") {
            return count
                .parse::<usize>()
                .ok()
                .filter(|n| *n <= MAX_SYSCALL_ARGS && count.len() == 1)
                .map(Op::Syscall);
        }
        let op = match word {
            "dup" => Op::Dup,
            "drop" => Op::Drop,
            "swap" => Op::Swap,
            "over" => Op::Over,
            "rot" => Op::Rot,
            "print" => Op::Print,
            "not" => Op::Not,
            "streq" => Op::StrEq,
            "true" => Op::PushBool(true),
            "false" => Op::PushBool(false),
            "@" => Op::Load(Access::Word),
            "!" => Op::Store(Access::Word),
            "@8" => Op::Load(Access::Byte),
            "!8" => Op::Store(Access::Byte),
            "int" => Op::Cast(PrimitiveKind::Number),
            "ptr" => Op::Cast(PrimitiveKind::Pointer),
            _ => return None,
        };
        Some(op)
    }

    /// Name used in diagnostics and assembly comments
    pub fn name(&self) -> String {
        match self {
            Op::PushNumber(n) => n.to_string(),
            Op::PushBool(b) => b.to_string(),
            Op::PushStr { label, .. } | Op::PushCStr { label } => format!("string {}", label),
            Op::PushMemory { label, .. } => format!("memory {}", label),
            Op::Dup => "dup".to_string(),
            Op::Drop => "drop".to_string(),
            Op::Swap => "swap".to_string(),
            Op::Over => "over".to_string(),
            Op::Rot => "rot".to_string(),
            Op::Print => "print".to_string(),
            Op::Binary(op) => op.symbol().to_string(),
            Op::Not => "not".to_string(),
            Op::StrEq => "streq".to_string(),
            Op::Load(Access::Word) => "@".to_string(),
            Op::Load(Access::Byte) => "@8".to_string(),
            Op::Load(Access::Struct(s)) => format!("{}@", s.name),
            Op::Store(Access::Word) => "!".to_string(),
            Op::Store(Access::Byte) => "!8".to_string(),
            Op::Store(Access::Struct(s)) => format!("{}!", s.name),
            Op::FieldOffset { structure, field } => format!("{}.{}", structure.name, field.name),
            Op::Syscall(n) => format!("syscall{}", n),
            Op::Cast(PrimitiveKind::Pointer) => "ptr".to_string(),
            Op::Cast(_) => "int".to_string(),
            Op::Pin(item) => format!("pin {}", item.name),
            Op::Unpin(item) => format!("unpin {}", item.name),
            Op::PushPinned(item) => item.name.clone(),
            Op::UpdatePinned(item) => format!("update {}", item.name),
        }
    }

    /// Literal contract for fixed-shape operations
    pub fn contract(&self) -> Option<Contract> {
        let n = || Typing::NUMBER;
        let p = || Typing::POINTER;
        let contract = match self {
            Op::PushNumber(_) | Op::PushBool(_) => Contract::new(vec![], vec![n()]),
            Op::PushStr { .. } => Contract::new(vec![], vec![Typing::string()]),
            Op::PushCStr { .. } => Contract::new(vec![], vec![p()]),
            Op::PushMemory { typing, .. } => Contract::new(vec![], vec![typing.clone()]),
            Op::Print => Contract::new(vec![n()], vec![]),
            Op::Binary(BinaryOp::Add) | Op::Binary(BinaryOp::Sub) => return None,
            Op::Binary(_) => Contract::new(vec![n(), n()], vec![n()]),
            Op::Not => Contract::new(vec![n()], vec![n()]),
            Op::StrEq => Contract::new(vec![n(), p(), n(), p()], vec![n()]),
            Op::Load(Access::Byte) => Contract::new(vec![p()], vec![n()]),
            Op::Store(Access::Byte) => Contract::new(vec![n(), p()], vec![]),
            Op::FieldOffset { structure, field } => Contract::new(
                vec![Typing::pointer_to(Typing::compound(structure.clone()))],
                vec![Typing::pointer_to(Typing::Primitive(field.kind))],
            ),
            Op::Cast(PrimitiveKind::Pointer) => Contract::new(vec![n()], vec![p()]),
            Op::Cast(_) => Contract::new(vec![p()], vec![n()]),
            _ => return None,
        };
        Some(contract)
    }
}

/// A primitive operation at a source location
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub location: SourceLoc,
}

impl ProgramNode for Instruction {
    fn location(&self) -> &SourceLoc {
        &self.location
    }

    fn verify(&self, stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()> {
        let name = self.op.name();
        let loc = &self.location;

        if let Some(contract) = self.op.contract() {
            return contract.verify(stack, &name, loc);
        }

        match &self.op {
            Op::Dup => {
                let [a] = stack.take::<1>(&name, loc)?;
                stack.push_entry(a.clone());
                stack.push_entry(a);
            }
            Op::Drop => {
                stack.take::<1>(&name, loc)?;
            }
            Op::Swap => {
                let [a, b] = stack.take::<2>(&name, loc)?;
                stack.push_entry(b);
                stack.push_entry(a);
            }
            Op::Over => {
                let [a, b] = stack.take::<2>(&name, loc)?;
                stack.push_entry(a.clone());
                stack.push_entry(b);
                stack.push_entry(a);
            }
            Op::Rot => {
                let [a, b, c] = stack.take::<3>(&name, loc)?;
                stack.push_entry(b);
                stack.push_entry(c);
                stack.push_entry(a);
            }
            Op::Binary(op) => {
                let [a, b] = stack.take::<2>(&name, loc)?;
                let result = match op {
                    BinaryOp::Sub => a.typing.subtract(&b.typing),
                    _ => a.typing.add(&b.typing),
                }
                .map_err(|kind| kind.at(loc))?;
                stack.push(&result, loc);
            }
            Op::Load(access) => {
                let [pointer] = stack.take::<1>(&name, loc)?;
                let pointee = pointee(&name, &pointer, access, loc)?;
                stack.push(&pointee, loc);
            }
            Op::Store(access) => {
                let [pointer] = stack.take::<1>(&name, loc)?;
                let pointee = pointee(&name, &pointer, access, loc)?;
                let expected = pointee.decompose();
                stack.require(&name, expected.len(), loc)?;
                for field in expected.iter().rev() {
                    stack.pop_expecting(&name, field, loc)?;
                }
            }
            Op::Syscall(count) => {
                stack.require(&name, count + 1, loc)?;
                stack.pop_expecting(&name, &Typing::NUMBER, loc)?;
                let args = stack.take_n(&name, *count, loc)?;
                if let Some(bad) = args.iter().find(|arg| !is_concrete_word(&arg.typing)) {
                    return Err(ErrorKind::type_mismatch(&name, "a Number or Pointer argument", &bad.typing).at(loc));
                }
                stack.push(&Typing::NUMBER, loc);
            }
            Op::Pin(item) => bind_pin(item, stack, pins, loc)?,
            Op::UpdatePinned(item) => update_pin(item, stack, pins, loc)?,
            Op::Unpin(item) => release_pin(item, pins),
            Op::PushPinned(item) => push_pinned(item, stack, pins, loc)?,
            other => {
                return Err(ErrorKind::malformed(format!("`{}` has no verification rule", other.name())).at(loc));
            }
        }
        Ok(())
    }

    fn emit(&self, asm: &mut AssemblyContext<'_>) {
        primitives::emit_op(&self.op, asm);
    }
}

fn is_concrete_word(typing: &Typing) -> bool {
    matches!(
        typing.kind(),
        Some(PrimitiveKind::Number) | Some(PrimitiveKind::Pointer)
    )
}

/// Typing read or written through `pointer` by a load/store of `access`
fn pointee(op: &str, pointer: &StackEntry, access: &Access, loc: &SourceLoc) -> Result<Typing> {
    if !pointer.typing.is_pointer() {
        return Err(ErrorKind::type_mismatch(op, "a pointer", &pointer.typing).at(loc));
    }

    match access {
        Access::Byte => Ok(Typing::NUMBER),
        Access::Word => match pointer.typing.inner() {
            None => Ok(Typing::NUMBER),
            Some(inner) if inner.words() == 1 => Ok(inner.clone()),
            Some(inner) => Err(ErrorKind::type_mismatch(
                op,
                "a pointer to a single word",
                format!("*{} (use {}@ / {}! instead)", inner, inner, inner),
            )
            .at(loc)),
        },
        Access::Struct(structure) => {
            let typing = Typing::compound(structure.clone());
            if let Some(inner) = pointer.typing.inner() {
                if !inner.matches(&typing) {
                    return Err(ErrorKind::type_mismatch(
                        op,
                        Typing::pointer_to(typing),
                        &pointer.typing,
                    )
                    .at(loc));
                }
            }
            Ok(typing)
        }
    }
}

/// Typing a pin currently holds, resolving `Runtime` pins through the side table
pub(crate) fn resolved_typing(item: &PinnedItem, pins: &PinRuntimeTypes, loc: &SourceLoc) -> Result<Typing> {
    if !item.typing.is_runtime() {
        return Ok(item.typing.clone());
    }
    pins.current(&item.name).cloned().ok_or_else(|| {
        ErrorKind::UnresolvedIdentifier {
            name: item.name.clone(),
        }
        .at(loc)
    })
}

/// Verify binding the top value to a fresh pin
///
/// A `Runtime` pin always records the observed typing, shadowing any outer
/// binding of the same name until its Unpin.
pub(crate) fn bind_pin(item: &PinnedItem, stack: &mut TypeStack, pins: &mut PinRuntimeTypes, loc: &SourceLoc) -> Result<()> {
    if !item.typing.is_runtime() {
        return pop_words(item, &item.typing, stack, loc);
    }

    let op = format!("pin {}", item.name);
    let [value] = stack.take::<1>(&op, loc)?;
    if !is_concrete_word(&value.typing) {
        return Err(ErrorKind::type_mismatch(&op, "a Number or Pointer", &value.typing).at(loc));
    }
    pins.record(&item.name, value.typing);
    Ok(())
}

/// Verify storing the top value into an already bound pin, keeping its typing
pub(crate) fn update_pin(item: &PinnedItem, stack: &mut TypeStack, pins: &PinRuntimeTypes, loc: &SourceLoc) -> Result<()> {
    let typing = resolved_typing(item, pins, loc)?;
    pop_words(item, &typing, stack, loc)
}

fn pop_words(item: &PinnedItem, typing: &Typing, stack: &mut TypeStack, loc: &SourceLoc) -> Result<()> {
    let op = format!("pin {}", item.name);
    let expected = typing.decompose();
    stack.require(&op, expected.len(), loc)?;
    for word in expected.iter().rev() {
        stack.pop_expecting(&op, word, loc)?;
    }
    Ok(())
}

pub(crate) fn push_pinned(
    item: &PinnedItem,
    stack: &mut TypeStack,
    pins: &PinRuntimeTypes,
    loc: &SourceLoc,
) -> Result<()> {
    let typing = resolved_typing(item, pins, loc)?;
    stack.push(&typing, loc);
    Ok(())
}

pub(crate) fn release_pin(item: &PinnedItem, pins: &mut PinRuntimeTypes) {
    if item.typing.is_runtime() {
        pins.release(&item.name);
    }
}
