/// Stoat - a concatenative language with pinned values
///
/// This crate implements the Stoat compiler, including:
/// - Lexer and two-pass parser with global name resolution
/// - Program tree whose nodes carry verification and emission rules
/// - Stack-effect verification over an abstract type stack
/// - NASM x86-64 Linux code generation

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod parser;
pub mod typechecker;

pub use ast::types::{PrimitiveKind, Structure, Typing};
pub use ast::{Node, Program, SourceLoc};
pub use config::CompilerConfig;
pub use error::{Error, ErrorKind, Result};

use codegen::{CodeGen, DataSection};
use parser::Parser;
use typechecker::TypeChecker;

/// Parse and verify a program without emitting anything
pub fn check_source(source: &str, filename: &str, config: &CompilerConfig) -> Result<(Program, DataSection)> {
    let (program, data) = Parser::with_config(source, filename, config)?.parse()?;
    TypeChecker::new().check_program(&program)?;
    Ok((program, data))
}

/// Compile a program to NASM text
pub fn compile_source(source: &str, filename: &str, config: &CompilerConfig) -> Result<String> {
    let (program, data) = check_source(source, filename, config)?;
    tracing::debug!(
        functions = program.functions.len(),
        strings = data.strings().len(),
        memories = data.memories().len(),
        "verified program"
    );
    Ok(CodeGen::new(config).compile_program(&program, &data))
}
