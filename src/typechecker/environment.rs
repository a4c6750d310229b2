/// Verification-time record of runtime-typed pins
///
/// A pin declared with the `Runtime` kind takes its concrete typing from
/// whatever value is pinned on the path being verified. Each name keeps a
/// stack of observed typings so nested pins of the same name shadow cleanly.
use crate::ast::types::Typing;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PinRuntimeTypes {
    observed: HashMap<String, Vec<Typing>>,
}

impl PinRuntimeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note the typing actually pinned under `name`
    pub fn record(&mut self, name: &str, typing: Typing) {
        self.observed.entry(name.to_string()).or_default().push(typing);
    }

    /// Typing currently observed for `name`
    pub fn current(&self, name: &str) -> Option<&Typing> {
        self.observed.get(name).and_then(|stack| stack.last())
    }

    /// Forget the innermost observation for `name`
    pub fn release(&mut self, name: &str) -> Option<Typing> {
        let stack = self.observed.get_mut(name)?;
        let typing = stack.pop();
        if stack.is_empty() {
            self.observed.remove(name);
        }
        typing
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_release_shadow() {
        let mut env = PinRuntimeTypes::new();
        env.record("x", Typing::NUMBER);
        env.record("x", Typing::POINTER);
        assert_eq!(env.current("x"), Some(&Typing::POINTER));
        assert_eq!(env.release("x"), Some(Typing::POINTER));
        assert_eq!(env.current("x"), Some(&Typing::NUMBER));
        env.release("x");
        assert!(env.is_empty());
        assert_eq!(env.release("x"), None);
    }
}
