/// Global name table
///
/// Structures, constants, memories and function signatures share one
/// namespace. Pins are scoped separately by the builder.
use crate::ast::SourceLoc;
use crate::ast::instruction::Op;
use crate::ast::types::{Structure, Typing};
use crate::error::{ErrorKind, Result};
use crate::parser::lexer::Keyword;
use crate::typechecker::Contract;
use std::collections::HashMap;
use std::rc::Rc;

/// Type names with a fixed meaning
pub const PRIMITIVE_TYPE_NAMES: [&str; 2] = ["Number", "Pointer"];

/// A function as seen from call sites
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    /// Index into the program's function list
    pub id: usize,
    pub label: String,
    pub contract: Contract,
    /// Parameter names and typings, bottom first, when the inputs are named
    pub params: Option<Vec<(String, Typing)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Struct(Rc<Structure>),
    Const(i64),
    Memory { label: String, typing: Typing },
    Function(FunctionSignature),
}

#[derive(Debug)]
pub struct Scope {
    entries: HashMap<String, (Definition, SourceLoc)>,
}

impl Scope {
    /// A scope holding the builtin `str` and `cstr` structures
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for structure in [Structure::string(), Structure::cstring()] {
            entries.insert(
                structure.name.clone(),
                (Definition::Struct(Rc::new(structure)), SourceLoc::builtin()),
            );
        }
        Scope { entries }
    }

    /// Add a definition, rejecting builtins, keywords and names already taken
    pub fn define(&mut self, name: &str, definition: Definition, location: &SourceLoc) -> Result<()> {
        if is_reserved(name) {
            return Err(ErrorKind::malformed(format!("`{}` is a builtin and cannot be redefined", name)).at(location));
        }
        if name.contains('.') || name.contains(':') || name.starts_with('*') {
            return Err(ErrorKind::malformed(format!("`{}` is not a valid name", name)).at(location));
        }
        if let Some((_, previous)) = self.entries.get(name) {
            return Err(ErrorKind::DuplicateDefinition {
                name: name.to_string(),
                previous: previous.clone(),
            }
            .at(location));
        }
        tracing::trace!(name, at = %location, "defined");
        self.entries.insert(name.to_string(), (definition, location.clone()));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.entries.get(name).map(|(definition, _)| definition)
    }

    pub fn structure(&self, name: &str) -> Option<&Rc<Structure>> {
        match self.get(name) {
            Some(Definition::Struct(structure)) => Some(structure),
            _ => None,
        }
    }

    /// Resolve type syntax: `Number`, `Pointer`, a structure name or `*T`
    pub fn resolve_typing(&self, text: &str, location: &SourceLoc) -> Result<Typing> {
        if let Some(inner) = text.strip_prefix('*') {
            return Ok(Typing::pointer_to(self.resolve_typing(inner, location)?));
        }
        match text {
            "Number" => Ok(Typing::NUMBER),
            "Pointer" => Ok(Typing::POINTER),
            "" => Err(ErrorKind::malformed("missing type name").at(location)),
            name => self
                .structure(name)
                .map(|structure| Typing::compound(structure.clone()))
                .ok_or_else(|| {
                    ErrorKind::UnresolvedIdentifier {
                        name: name.to_string(),
                    }
                    .at(location)
                }),
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_reserved(name: &str) -> bool {
    Op::builtin(name).is_some() || Keyword::from_word(name).is_some() || PRIMITIVE_TYPE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize) -> SourceLoc {
        SourceLoc::new(line, 1, "test.stoat")
    }

    #[test]
    fn test_builtin_structures() {
        let scope = Scope::new();
        assert_eq!(scope.resolve_typing("str", &loc(1)).unwrap(), Typing::string());
        assert_eq!(scope.resolve_typing("cstr", &loc(1)).unwrap(), Typing::POINTER);
        assert_eq!(
            scope.resolve_typing("**Number", &loc(1)).unwrap(),
            Typing::pointer_to(Typing::pointer_to(Typing::NUMBER))
        );
    }

    #[test]
    fn test_duplicate_reports_previous_location() {
        let mut scope = Scope::new();
        scope.define("limit", Definition::Const(10), &loc(1)).unwrap();
        let err = scope.define("limit", Definition::Const(20), &loc(5)).unwrap_err();
        assert_eq!(err.location, loc(5));
        assert_eq!(
            err.kind,
            ErrorKind::DuplicateDefinition {
                name: "limit".to_string(),
                previous: loc(1),
            }
        );

        let err = scope.define("str", Definition::Const(1), &loc(6)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateDefinition { .. }));
    }

    #[test]
    fn test_builtins_cannot_be_redefined() {
        let mut scope = Scope::new();
        for name in ["dup", "+", "syscall3", "loop", "Number"] {
            let err = scope.define(name, Definition::Const(0), &loc(1)).unwrap_err();
            assert!(matches!(err.kind, ErrorKind::MalformedSyntax { .. }), "{}", name);
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = Scope::new().resolve_typing("Point", &loc(2)).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UnresolvedIdentifier {
                name: "Point".to_string()
            }
        );
    }
}
