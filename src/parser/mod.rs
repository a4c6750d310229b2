/// Parser for Stoat
///
/// Hand-written lexer and two-pass recursive descent parser. Produces the
/// program tree together with its data tables.

pub mod lexer;
#[allow(clippy::module_inception)]
mod parser;
pub mod scope;

pub use lexer::{Keyword, Lexer, Token, TokenKind};
pub use parser::Parser;
pub use scope::{Definition, FunctionSignature, Scope};
