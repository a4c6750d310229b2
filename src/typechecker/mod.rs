/// Type checker for Stoat
///
/// Verification is an abstract interpretation of the program tree over a
/// stack of typings:
/// - Stack-effect contracts for builtins and functions
/// - Shape agreement for branches and loops
/// - Per-use typing of runtime-typed pins

pub mod checker;
pub mod contract;
pub mod environment;
pub mod stack;

pub use checker::TypeChecker;
pub use contract::Contract;
pub use environment::PinRuntimeTypes;
pub use stack::{StackDiff, StackDiffKind, StackEntry, TypeStack};
