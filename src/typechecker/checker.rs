/**
Whole-program verification

Checks every function definition against its declared contract, then the
top-level code against the empty contract.
*/
use crate::ast::Program;
use crate::error::Result;
use crate::typechecker::environment::PinRuntimeTypes;

/// The main type checker
pub struct TypeChecker {
    pins: PinRuntimeTypes,
}

impl TypeChecker {
    /// Create a new type checker
    pub fn new() -> Self {
        TypeChecker {
            pins: PinRuntimeTypes::new(),
        }
    }

    /// Type check a complete program
    pub fn check_program(&mut self, program: &Program) -> Result<()> {
        // Definitions first, so call sites only ever trust verified contracts
        for function in &program.functions {
            tracing::debug!(function = %function.name, contract = %function.contract, "checking function");
            function.matches_contract(&mut self.pins)?;
        }

        tracing::debug!("checking top-level code");
        program.main.matches_contract(&mut self.pins)?;
        Ok(())
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}
