/// Program node tree for Stoat
///
/// The front end resolves source words into a tree of [`Node`]s. Every node
/// carries both halves of its meaning: a verification rule over the abstract
/// [`TypeStack`] and an emission rule into an [`AssemblyContext`]. The tree
/// is built once and only read afterwards.

pub mod branching;
pub mod builder;
pub mod function;
pub mod instruction;
pub mod looping;
pub mod pins;
pub mod types;

pub use branching::{Arms, Branching};
pub use builder::Builder;
pub use function::{Function, FunctionCall};
pub use instruction::{Access, BinaryOp, Instruction, Op};
pub use looping::Loop;
pub use pins::{PinRegistry, PinnedItem};

use crate::codegen::AssemblyContext;
use crate::error::Result;
use crate::typechecker::{PinRuntimeTypes, TypeStack};
use std::fmt;
use std::rc::Rc;

/// Source location: file, line and column (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub line: usize,
    pub column: usize,
    pub file: Rc<str>,
}

impl SourceLoc {
    pub fn new(line: usize, column: usize, file: impl Into<Rc<str>>) -> Self {
        SourceLoc {
            line,
            column,
            file: file.into(),
        }
    }

    /// Location used for compiler-provided definitions
    pub fn builtin() -> Self {
        SourceLoc::new(0, 0, "<builtin>")
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A compiled unit: verified against a type stack, then emitted as assembly
pub trait ProgramNode {
    fn location(&self) -> &SourceLoc;

    /// Check this node against the abstract stack, updating it in place
    fn verify(&self, stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()>;

    /// Append this node's native instructions
    fn emit(&self, asm: &mut AssemblyContext<'_>);
}

/// A node in the program tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Instruction(Instruction),
    /// Call site of a contract-checked function
    Function(FunctionCall),
    Branching(Branching),
    Loop(Loop),
}

impl Node {
    pub fn instruction(op: Op, location: &SourceLoc) -> Node {
        Node::Instruction(Instruction {
            op,
            location: location.clone(),
        })
    }
}

impl ProgramNode for Node {
    fn location(&self) -> &SourceLoc {
        match self {
            Node::Instruction(n) => n.location(),
            Node::Function(n) => n.location(),
            Node::Branching(n) => n.location(),
            Node::Loop(n) => n.location(),
        }
    }

    fn verify(&self, stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()> {
        match self {
            Node::Instruction(n) => n.verify(stack, pins),
            Node::Function(n) => n.verify(stack, pins),
            Node::Branching(n) => n.verify(stack, pins),
            Node::Loop(n) => n.verify(stack, pins),
        }
    }

    fn emit(&self, asm: &mut AssemblyContext<'_>) {
        match self {
            Node::Instruction(n) => n.emit(asm),
            Node::Function(n) => n.emit(asm),
            Node::Branching(n) => n.emit(asm),
            Node::Loop(n) => n.emit(asm),
        }
    }
}

/// Verify a sequence of nodes in order
pub fn verify_block(nodes: &[Node], stack: &mut TypeStack, pins: &mut PinRuntimeTypes) -> Result<()> {
    for node in nodes {
        node.verify(stack, pins)?;
    }
    Ok(())
}

/// Emit a sequence of nodes in order
pub fn emit_block(nodes: &[Node], asm: &mut AssemblyContext<'_>) {
    for node in nodes {
        node.emit(asm);
    }
}

/// A fully resolved program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Function definitions, indexed by call-site id
    pub functions: Vec<Function>,
    /// Top-level code, run from the entry point with the empty contract
    pub main: Function,
}
