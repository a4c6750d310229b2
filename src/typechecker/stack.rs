/// Type stack: the abstract interpreter's value stack
///
/// Holds only decomposed, word-sized typings together with the location that
/// produced each word. It never holds concrete values.
use crate::ast::SourceLoc;
use crate::ast::types::Typing;
use crate::error::{ErrorKind, Result};
use std::fmt;
use std::fmt::Write as _;

/// One word on the abstract stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackEntry {
    pub typing: Typing,
    pub origin: SourceLoc,
}

/// Outcome of comparing two stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackDiffKind {
    Equal,
    SizeDifference,
    TypeDifference,
}

/// Structural comparison result with an element-by-element report
#[derive(Debug, Clone, PartialEq)]
pub struct StackDiff {
    pub verdict: StackDiffKind,
    pub report: String,
}

impl StackDiff {
    pub fn is_equal(&self) -> bool {
        self.verdict == StackDiffKind::Equal
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeStack {
    entries: Vec<StackEntry>,
}

impl TypeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack holding the decomposition of `typings`, bottom first
    pub fn seeded(typings: &[Typing], origin: &SourceLoc) -> Self {
        let mut stack = TypeStack::new();
        for typing in typings {
            stack.push(typing, origin);
        }
        stack
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push a logical value, one entry per machine word
    pub fn push(&mut self, typing: &Typing, origin: &SourceLoc) {
        for word in typing.decompose() {
            self.entries.push(StackEntry {
                typing: word,
                origin: origin.clone(),
            });
        }
    }

    /// Push an existing word back, keeping its origin
    pub fn push_entry(&mut self, entry: StackEntry) {
        self.entries.push(entry);
    }

    pub fn peek(&self) -> Option<&StackEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Fail with a stack underflow unless at least `count` words are present
    pub fn require(&self, op: &str, count: usize, location: &SourceLoc) -> Result<()> {
        if self.entries.len() < count {
            return Err(ErrorKind::StackUnderflow {
                op: op.to_string(),
                required: count,
                available: self.entries.len(),
            }
            .at(location));
        }
        Ok(())
    }

    /// Pop `count` words, returned bottom first
    pub fn take_n(&mut self, op: &str, count: usize, location: &SourceLoc) -> Result<Vec<StackEntry>> {
        self.require(op, count, location)?;
        let split = self.entries.len() - count;
        Ok(self.entries.split_off(split))
    }

    /// Pop exactly `N` words, returned bottom first
    pub fn take<const N: usize>(&mut self, op: &str, location: &SourceLoc) -> Result<[StackEntry; N]> {
        let available = self.entries.len();
        self.take_n(op, N, location)?.try_into().map_err(|_| {
            ErrorKind::StackUnderflow {
                op: op.to_string(),
                required: N,
                available,
            }
            .at(location)
        })
    }

    /// Pop the top word and check it against `expected`
    pub fn pop_expecting(&mut self, op: &str, expected: &Typing, location: &SourceLoc) -> Result<StackEntry> {
        let [entry] = self.take::<1>(op, location)?;
        if !entry.typing.matches(expected) {
            return Err(ErrorKind::type_mismatch(op, expected, &entry.typing).at(location));
        }
        Ok(entry)
    }

    /// Compare shapes: same length and position-wise matching types
    pub fn diff(&self, other: &TypeStack) -> StackDiff {
        let mut verdict = if self.len() == other.len() {
            StackDiffKind::Equal
        } else {
            StackDiffKind::SizeDifference
        };

        let mut report = String::new();
        let depth = self.len().max(other.len());
        for i in 0..depth {
            let left = self.entries.get(i);
            let right = other.entries.get(i);
            let same = match (left, right) {
                (Some(l), Some(r)) => l.typing.matches(&r.typing),
                _ => false,
            };
            if !same && verdict == StackDiffKind::Equal {
                verdict = StackDiffKind::TypeDifference;
            }
            let _ = writeln!(
                report,
                "  [{}] {:<32} {} {}",
                i,
                describe(left),
                if same { "==" } else { "!=" },
                describe(right)
            );
        }

        StackDiff { verdict, report }
    }
}

fn describe(entry: Option<&StackEntry>) -> String {
    match entry {
        Some(e) => format!("{} ({})", e.typing, e.origin),
        None => "-".to_string(),
    }
}

impl fmt::Display for TypeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", entry.typing)?;
        }
        write!(f, "]")
    }
}
