/// Typing model for Stoat
///
/// Every value on the data stack is a sequence of 64-bit machine words. A
/// [`Typing`] describes one logical value: a primitive word, a typed pointer,
/// or a compound structure that occupies one word per field.
use crate::error::ErrorKind;
use std::fmt;
use std::rc::Rc;

/// Size in bytes of one stack word
pub const WORD_SIZE: usize = 8;

/// The kind of a single machine word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// 64-bit integer
    Number,
    /// 64-bit address
    Pointer,
    /// Resolved per use from the value currently pinned under a name
    Runtime,
    /// Error sentinel
    Unknown,
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveKind::Number => write!(f, "Number"),
            PrimitiveKind::Pointer => write!(f, "Pointer"),
            PrimitiveKind::Runtime => write!(f, "Runtime"),
            PrimitiveKind::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A structure field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub kind: PrimitiveKind,
}

/// A named, ordered list of fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Structure {
    /// Build a structure from `(name, kind)` pairs, laying fields out one word each
    pub fn new(name: impl Into<String>, fields: &[(&str, PrimitiveKind)]) -> Self {
        let fields = fields
            .iter()
            .enumerate()
            .map(|(i, (field, kind))| Field {
                name: field.to_string(),
                offset: i * WORD_SIZE,
                size: WORD_SIZE,
                kind: *kind,
            })
            .collect();
        Structure {
            name: name.into(),
            fields,
        }
    }

    /// Length-prefixed string: `length` below `start` on the stack
    pub fn string() -> Self {
        Structure::new(
            "str",
            &[
                ("length", PrimitiveKind::Number),
                ("start", PrimitiveKind::Pointer),
            ],
        )
    }

    /// Null-terminated string
    pub fn cstring() -> Self {
        Structure::new("cstr", &[("start", PrimitiveKind::Pointer)])
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.size).sum()
    }
}

/// Type of a logical stack value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Typing {
    /// A single machine word
    Primitive(PrimitiveKind),
    /// A pointer to a known typing
    Pointer(Box<Typing>),
    /// A structure, one word per field
    Compound(Rc<Structure>),
}

impl Typing {
    pub const NUMBER: Typing = Typing::Primitive(PrimitiveKind::Number);
    pub const POINTER: Typing = Typing::Primitive(PrimitiveKind::Pointer);
    pub const RUNTIME: Typing = Typing::Primitive(PrimitiveKind::Runtime);
    pub const UNKNOWN: Typing = Typing::Primitive(PrimitiveKind::Unknown);

    /// Wrap a structure; a single-field structure degenerates to its field's primitive
    pub fn compound(structure: Rc<Structure>) -> Typing {
        match structure.fields.as_slice() {
            [only] => Typing::Primitive(only.kind),
            _ => Typing::Compound(structure),
        }
    }

    pub fn pointer_to(inner: Typing) -> Typing {
        Typing::Pointer(Box::new(inner))
    }

    /// The built-in `str` typing
    pub fn string() -> Typing {
        Typing::compound(Rc::new(Structure::string()))
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        match self {
            Typing::Primitive(_) | Typing::Pointer(_) => WORD_SIZE,
            Typing::Compound(s) => s.size(),
        }
    }

    /// Expand into the machine words this value occupies, bottom first
    pub fn decompose(&self) -> Vec<Typing> {
        match self {
            Typing::Compound(s) => s
                .fields
                .iter()
                .map(|f| Typing::Primitive(f.kind))
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Number of stack words
    pub fn words(&self) -> usize {
        match self {
            Typing::Compound(s) => s.fields.len(),
            _ => 1,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Typing::Primitive(PrimitiveKind::Pointer) | Typing::Pointer(_)
        )
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Typing::Primitive(PrimitiveKind::Runtime))
    }

    /// The pointee of a typed pointer
    pub fn inner(&self) -> Option<&Typing> {
        match self {
            Typing::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Primitive kind of a single-word typing
    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Typing::Primitive(kind) => Some(*kind),
            Typing::Pointer(_) => Some(PrimitiveKind::Pointer),
            Typing::Compound(_) => None,
        }
    }

    /// Structural equality where any two pointers are interchangeable
    pub fn matches(&self, other: &Typing) -> bool {
        if self.is_pointer() && other.is_pointer() {
            return true;
        }
        match (self, other) {
            (Typing::Primitive(PrimitiveKind::Unknown), _)
            | (_, Typing::Primitive(PrimitiveKind::Unknown)) => false,
            (Typing::Primitive(a), Typing::Primitive(b)) => a == b,
            (Typing::Compound(a), Typing::Compound(b)) => a == b,
            _ => false,
        }
    }

    /// Result type of `self + other`
    pub fn add(&self, other: &Typing) -> Result<Typing, ErrorKind> {
        match (self.is_pointer(), other.is_pointer()) {
            (true, true) => Err(ErrorKind::type_mismatch(
                "+",
                "at most one pointer operand",
                format!("{} and {}", self, other),
            )),
            (true, false) => {
                expect_number("+", other)?;
                Ok(self.clone())
            }
            (false, true) => {
                expect_number("+", self)?;
                Ok(other.clone())
            }
            (false, false) => {
                expect_number("+", self)?;
                expect_number("+", other)?;
                Ok(Typing::NUMBER)
            }
        }
    }

    /// Result type of `self - other`
    pub fn subtract(&self, other: &Typing) -> Result<Typing, ErrorKind> {
        match (self.is_pointer(), other.is_pointer()) {
            (true, true) => Ok(Typing::NUMBER),
            (true, false) => {
                expect_number("-", other)?;
                Ok(self.clone())
            }
            (false, true) => Err(ErrorKind::type_mismatch(
                "-",
                "Number",
                format!("{} (cannot subtract a pointer from a number)", other),
            )),
            (false, false) => {
                expect_number("-", self)?;
                expect_number("-", other)?;
                Ok(Typing::NUMBER)
            }
        }
    }
}

fn expect_number(op: &str, typing: &Typing) -> Result<(), ErrorKind> {
    if typing.matches(&Typing::NUMBER) {
        Ok(())
    } else {
        Err(ErrorKind::type_mismatch(op, "Number", typing))
    }
}

impl fmt::Display for Typing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Typing::Primitive(kind) => write!(f, "{}", kind),
            Typing::Pointer(inner) => write!(f, "*{}", inner),
            Typing::Compound(s) => write!(f, "{}", s.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Rc<Structure> {
        Rc::new(Structure::new(
            "Point",
            &[("x", PrimitiveKind::Number), ("y", PrimitiveKind::Number)],
        ))
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Typing::NUMBER.size(), 8);
        assert_eq!(Typing::pointer_to(Typing::compound(point())).size(), 8);
        assert_eq!(Typing::compound(point()).size(), 16);
        assert_eq!(Typing::string().size(), 16);
    }

    #[test]
    fn test_decompose() {
        assert_eq!(Typing::NUMBER.decompose(), vec![Typing::NUMBER]);
        assert_eq!(
            Typing::string().decompose(),
            vec![Typing::NUMBER, Typing::POINTER]
        );
        assert_eq!(Typing::compound(point()).words(), 2);
    }

    #[test]
    fn test_single_field_compound_degenerates() {
        let cstr = Typing::compound(Rc::new(Structure::cstring()));
        assert_eq!(cstr, Typing::POINTER);
    }

    #[test]
    fn test_field_offsets() {
        let s = point();
        assert_eq!(s.field("x").map(|f| f.offset), Some(0));
        assert_eq!(s.field("y").map(|f| f.offset), Some(8));
        assert!(s.field("z").is_none());
    }

    #[test]
    fn test_pointer_wildcard() {
        let typed = Typing::pointer_to(Typing::compound(point()));
        assert!(typed.matches(&Typing::POINTER));
        assert!(Typing::POINTER.matches(&typed));
        assert!(!typed.matches(&Typing::NUMBER));
        assert!(!Typing::UNKNOWN.matches(&Typing::UNKNOWN));
        assert_eq!(typed.inner(), Some(&Typing::compound(point())));
        assert_eq!(Typing::POINTER.inner(), None);
    }

    #[test]
    fn test_pointer_arithmetic() {
        let p = Typing::pointer_to(Typing::NUMBER);
        assert_eq!(p.add(&Typing::NUMBER), Ok(p.clone()));
        assert_eq!(Typing::NUMBER.add(&p), Ok(p.clone()));
        assert_eq!(Typing::NUMBER.add(&Typing::NUMBER), Ok(Typing::NUMBER));
        assert!(p.add(&Typing::POINTER).is_err());

        assert_eq!(p.subtract(&Typing::NUMBER), Ok(p.clone()));
        assert_eq!(p.subtract(&Typing::POINTER), Ok(Typing::NUMBER));
        assert!(Typing::NUMBER.subtract(&p).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Typing::pointer_to(Typing::compound(point())).to_string(), "*Point");
        assert_eq!(Typing::string().to_string(), "str");
    }
}
