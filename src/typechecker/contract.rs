/// Stack-effect contracts
///
/// A contract lists the typings an operation requires on top of the stack
/// and the typings it leaves there, both bottom first.
use crate::ast::SourceLoc;
use crate::ast::types::Typing;
use crate::error::{ErrorKind, Result};
use crate::typechecker::stack::TypeStack;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contract {
    pub inputs: Vec<Typing>,
    pub outputs: Vec<Typing>,
}

impl Contract {
    pub fn new(inputs: Vec<Typing>, outputs: Vec<Typing>) -> Self {
        Contract { inputs, outputs }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Contract of running `self` and then `next`
    ///
    /// `next`'s inputs are unified top-first against `self`'s outputs. Inputs
    /// left over once those outputs run out become extra requirements below
    /// `self`'s own inputs. When a structure meets a different spelling of
    /// the same words, the boundary is unified word by word instead.
    pub fn compose(&self, next: &Contract) -> std::result::Result<Contract, ErrorKind> {
        self.unify(next).or_else(|err| {
            let is_compound = |typing: &Typing| matches!(typing, Typing::Compound(_));
            if !self.outputs.iter().chain(&next.inputs).any(is_compound) {
                return Err(err);
            }
            let words = |typings: &[Typing]| -> Vec<Typing> {
                typings.iter().flat_map(Typing::decompose).collect()
            };
            let produced = Contract::new(self.inputs.clone(), words(&self.outputs));
            let consumed = Contract::new(words(&next.inputs), next.outputs.clone());
            produced.unify(&consumed)
        })
    }

    fn unify(&self, next: &Contract) -> std::result::Result<Contract, ErrorKind> {
        let mut available = self.outputs.clone();
        let mut unmatched = VecDeque::new();

        for wanted in next.inputs.iter().rev() {
            match available.pop() {
                Some(produced) => {
                    if !produced.matches(wanted) {
                        return Err(ErrorKind::type_mismatch("compose", wanted, &produced));
                    }
                }
                None => unmatched.push_front(wanted.clone()),
            }
        }

        let mut inputs: Vec<Typing> = unmatched.into();
        inputs.extend(self.inputs.iter().cloned());
        let mut outputs = available;
        outputs.extend(next.outputs.iter().cloned());

        Ok(Contract { inputs, outputs })
    }

    /// Apply this contract to `stack`
    pub fn verify(&self, stack: &mut TypeStack, op: &str, location: &SourceLoc) -> Result<()> {
        let expected: Vec<Typing> = self.inputs.iter().flat_map(Typing::decompose).collect();
        let actual = stack.take_n(op, expected.len(), location)?;

        for (wanted, entry) in expected.iter().zip(&actual).rev() {
            if !entry.typing.matches(wanted) {
                return Err(ErrorKind::type_mismatch(op, wanted, &entry.typing).at(location));
            }
        }

        for output in &self.outputs {
            stack.push(output, location);
        }
        Ok(())
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for input in &self.inputs {
            write!(f, " {}", input)?;
        }
        write!(f, " --")?;
        for output in &self.outputs {
            write!(f, " {}", output)?;
        }
        write!(f, " )")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n() -> Typing {
        Typing::NUMBER
    }

    fn p() -> Typing {
        Typing::POINTER
    }

    fn loc() -> SourceLoc {
        SourceLoc::new(1, 1, "test.stoat")
    }

    #[test]
    fn test_compose_concatenates_outputs() {
        let a = Contract::new(vec![], vec![n()]);
        let b = Contract::new(vec![], vec![p()]);
        assert_eq!(a.compose(&b).unwrap(), Contract::new(vec![], vec![n(), p()]));
    }

    #[test]
    fn test_compose_consumes_outputs() {
        let a = Contract::new(vec![n(), p()], vec![n()]);
        let b = Contract::new(vec![n()], vec![p()]);
        assert_eq!(
            a.compose(&b).unwrap(),
            Contract::new(vec![n(), p()], vec![p()])
        );
    }

    #[test]
    fn test_compose_prepends_unmatched_inputs() {
        let a = Contract::new(vec![n(), p()], vec![n()]);
        let b = Contract::new(vec![Typing::string(), n()], vec![p()]);
        assert_eq!(
            a.compose(&b).unwrap(),
            Contract::new(vec![Typing::string(), n(), p()], vec![p()])
        );
    }

    #[test]
    fn test_compose_mismatch() {
        let a = Contract::new(vec![], vec![p()]);
        let b = Contract::new(vec![n()], vec![]);
        assert!(matches!(
            a.compose(&b),
            Err(ErrorKind::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_compose_splits_structures_into_words() {
        let pushes_str = Contract::new(vec![], vec![Typing::string()]);
        let takes_words = Contract::new(vec![n(), p()], vec![]);
        assert_eq!(pushes_str.compose(&takes_words).unwrap(), Contract::empty());

        let takes_pointer = Contract::new(vec![p()], vec![n()]);
        assert_eq!(
            pushes_str.compose(&takes_pointer).unwrap(),
            Contract::new(vec![], vec![n(), n()])
        );

        let pushes_words = Contract::new(vec![], vec![n(), p()]);
        let takes_str = Contract::new(vec![Typing::string()], vec![n()]);
        assert_eq!(pushes_words.compose(&takes_str).unwrap(), Contract::new(vec![], vec![n()]));

        let pushes_pointers = Contract::new(vec![], vec![p(), p()]);
        assert!(matches!(
            pushes_pointers.compose(&takes_str),
            Err(ErrorKind::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_compose_pointer_wildcard() {
        let a = Contract::new(vec![], vec![Typing::pointer_to(n())]);
        let b = Contract::new(vec![p()], vec![n()]);
        assert_eq!(a.compose(&b).unwrap(), Contract::new(vec![], vec![n()]));
    }

    #[test]
    fn test_verify_applies_contract() {
        let mut stack = TypeStack::seeded(&[n(), n()], &loc());
        let add = Contract::new(vec![n(), n()], vec![n()]);
        add.verify(&mut stack, "+", &loc()).unwrap();
        assert_eq!(stack.to_string(), "[Number]");
    }

    #[test]
    fn test_verify_decomposes_compound_inputs() {
        let mut stack = TypeStack::seeded(&[Typing::string(), Typing::string()], &loc());
        let streq = Contract::new(vec![n(), p(), n(), p()], vec![n()]);
        streq.verify(&mut stack, "streq", &loc()).unwrap();
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_verify_underflow_and_mismatch() {
        let add = Contract::new(vec![n(), n()], vec![n()]);

        let mut stack = TypeStack::seeded(&[n()], &loc());
        let err = add.verify(&mut stack, "+", &loc()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::StackUnderflow { required: 2, available: 1, .. }));

        let mut stack = TypeStack::seeded(&[n(), p()], &loc());
        let err = add.verify(&mut stack, "+", &loc()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_display() {
        let c = Contract::new(vec![n(), p()], vec![n()]);
        assert_eq!(c.to_string(), "( Number Pointer -- Number )");
        assert_eq!(Contract::empty().to_string(), "( -- )");
        assert!(Contract::empty().is_empty());
    }

    fn typing() -> impl Strategy<Value = Typing> {
        prop_oneof![
            Just(Typing::NUMBER),
            Just(Typing::POINTER),
            Just(Typing::string()),
        ]
    }

    fn contract() -> impl Strategy<Value = Contract> {
        (
            prop::collection::vec(typing(), 0..5),
            prop::collection::vec(typing(), 0..5),
        )
            .prop_map(|(inputs, outputs)| Contract::new(inputs, outputs))
    }

    proptest! {
        #[test]
        fn prop_empty_is_right_identity(c in contract()) {
            prop_assert_eq!(c.compose(&Contract::empty()).unwrap(), c);
        }

        #[test]
        fn prop_empty_is_left_identity(c in contract()) {
            prop_assert_eq!(Contract::empty().compose(&c).unwrap(), c);
        }
    }
}
