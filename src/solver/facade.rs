//! The `Solver` façade: declared-variable bookkeeping, a push/pop stack, conjunct
//! splitting on assertion, and a skip-solving dry-run mode.
//!
//! Close to a direct translation of `BMCSolver`/`TraceSolver` in
//! `analyzers/mcsolver.py` — that class's `_add_assertion`/`_push`/`_pop`/
//! `_get_model`/`_reset_assertions`/`_solve` map one to one onto the methods here.

use crate::error::CoreError;
use crate::expr::Expr;
use crate::printer;
use crate::solver::backend::{RawModel, SatResult, SmtBackend};

use log::{debug, info, trace};
use std::collections::HashSet;
use std::path::Path;

pub struct Solver {
    backend: Box<dyn SmtBackend>,
    logic: String,
    declared: HashSet<String>,
    declared_stack: Vec<HashSet<String>>,
    depth: usize,
    skip_solving: bool,
}

impl Solver {
    pub fn new(
        backend: Box<dyn SmtBackend>,
        logic: impl Into<String>,
        skip_solving: bool,
    ) -> Result<Solver, CoreError> {
        let logic = logic.into();
        let mut solver = Solver {
            backend,
            logic,
            declared: HashSet::new(),
            declared_stack: Vec::new(),
            depth: 0,
            skip_solving,
        };
        solver.backend.set_logic(&solver.logic)?;
        info!("solver initialized, logic={}", solver.logic);
        Ok(solver)
    }

    /// Splits `expr` into its top-level conjuncts and asserts each one separately,
    /// declaring any symbol seen for the first time.
    pub fn add_assertion(&mut self, expr: &Expr) -> Result<(), CoreError> {
        for conjunct in expr.conjunctive_partition() {
            for sym in conjunct.free_vars() {
                if self.declared.insert(sym.name.clone()) {
                    self.backend.declare(&sym)?;
                }
            }
            trace!("assert {}", printer::expr_to_smtlib2(&conjunct));
            self.backend.assert(&conjunct)?;
        }
        Ok(())
    }

    /// Snapshots the declared-variable set onto a stack aligned with the backend's
    /// own push, so a later `pop` can restore exactly which symbols were declared
    /// at that scope.
    pub fn push(&mut self) -> Result<(), CoreError> {
        self.declared_stack.push(self.declared.clone());
        self.depth += 1;
        trace!("push -> depth {}", self.depth);
        self.backend.push()
    }

    pub fn pop(&mut self) -> Result<(), CoreError> {
        self.backend.pop()?;
        if let Some(declared) = self.declared_stack.pop() {
            self.declared = declared;
        }
        self.depth = self.depth.saturating_sub(1);
        trace!("pop -> depth {}", self.depth);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// In `skip_solving` mode, the façade never calls the backend and always
    /// reports `Unknown` — used to measure encoding size/time without paying for
    /// the actual search.
    pub fn solve(&mut self) -> Result<SatResult, CoreError> {
        if self.skip_solving {
            debug!("skip_solving set, not invoking backend");
            return Ok(SatResult::Unknown);
        }
        let result = self.backend.check_sat()?;
        info!("check-sat -> {:?}", result);
        Ok(result)
    }

    pub fn model(&mut self) -> Result<RawModel, CoreError> {
        self.backend.get_model()
    }

    /// Drops every assertion and declared symbol, re-establishing the logic.
    pub fn reset_assertions(&mut self) -> Result<(), CoreError> {
        self.backend.reset()?;
        self.declared.clear();
        self.declared_stack.clear();
        self.depth = 0;
        self.backend.set_logic(&self.logic)
    }

    pub fn comment(&mut self, text: &str) -> Result<(), CoreError> {
        self.backend.comment(text)
    }

    pub fn enable_trace_file(&mut self, path: &Path) -> Result<(), CoreError> {
        self.backend.tee(path)?;
        self.backend.comment("START session")
    }

    pub fn exit(&mut self) -> Result<(), CoreError> {
        self.comment("END session").ok();
        self.backend.exit()
    }

    pub fn skip_solving(&self) -> bool {
        self.skip_solving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorts::Sort;
    use crate::symbol::Symbol;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeBackendState {
        declared: Vec<String>,
        asserted: Vec<String>,
        push_count: usize,
        pop_count: usize,
        sat: SatResult,
    }

    struct FakeBackend(Rc<RefCell<FakeBackendState>>);

    impl SmtBackend for FakeBackend {
        fn set_logic(&mut self, _logic_name: &str) -> Result<(), CoreError> {
            Ok(())
        }
        fn declare(&mut self, symbol: &Symbol) -> Result<(), CoreError> {
            self.0.borrow_mut().declared.push(symbol.name.clone());
            Ok(())
        }
        fn assert(&mut self, expr: &Expr) -> Result<(), CoreError> {
            self.0
                .borrow_mut()
                .asserted
                .push(printer::expr_to_smtlib2(expr));
            Ok(())
        }
        fn push(&mut self) -> Result<(), CoreError> {
            self.0.borrow_mut().push_count += 1;
            Ok(())
        }
        fn pop(&mut self) -> Result<(), CoreError> {
            self.0.borrow_mut().pop_count += 1;
            Ok(())
        }
        fn check_sat(&mut self) -> Result<SatResult, CoreError> {
            Ok(self.0.borrow().sat)
        }
        fn get_model(&mut self) -> Result<RawModel, CoreError> {
            Ok(RawModel::new())
        }
        fn reset(&mut self) -> Result<(), CoreError> {
            let mut state = self.0.borrow_mut();
            state.declared.clear();
            state.asserted.clear();
            Ok(())
        }
        fn exit(&mut self) -> Result<(), CoreError> {
            Ok(())
        }
        fn tee(&mut self, _path: &Path) -> Result<(), CoreError> {
            Ok(())
        }
        fn comment(&mut self, _text: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_add_assertion_splits_conjuncts_and_declares_once() {
        let state = Rc::new(RefCell::new(FakeBackendState::default()));
        let mut solver = Solver::new(Box::new(FakeBackend(state.clone())), "QF_BV", false).unwrap();

        let a = Expr::var(Symbol::new("a", Sort::BitVec(4)));
        let b = Expr::var(Symbol::new("b", Sort::BitVec(4)));
        let conj = Expr::and(
            Expr::bv_ult(a.clone(), b.clone()).unwrap(),
            Expr::bv_ult(a, Expr::bv_const(10, 4)).unwrap(),
        )
        .unwrap();
        solver.add_assertion(&conj).unwrap();

        assert_eq!(state.borrow().asserted.len(), 2);
        // `a` appears in both conjuncts but must be declared once.
        assert_eq!(
            state.borrow().declared.iter().filter(|n| *n == "a").count(),
            1
        );
    }

    #[test]
    fn test_push_pop_tracks_depth() {
        let state = Rc::new(RefCell::new(FakeBackendState::default()));
        let mut solver = Solver::new(Box::new(FakeBackend(state)), "QF_BV", false).unwrap();
        assert_eq!(solver.depth(), 0);
        solver.push().unwrap();
        solver.push().unwrap();
        assert_eq!(solver.depth(), 2);
        solver.pop().unwrap();
        assert_eq!(solver.depth(), 1);
    }

    #[test]
    fn test_skip_solving_never_calls_backend() {
        let state = Rc::new(RefCell::new(FakeBackendState::default()));
        state.borrow_mut().sat = SatResult::Unsat;
        let mut solver = Solver::new(Box::new(FakeBackend(state)), "QF_BV", true).unwrap();
        assert_eq!(solver.solve().unwrap(), SatResult::Unknown);
    }

    /// A symbol declared inside a pushed scope must be re-declared once that
    /// scope is popped — the declared-variable set has to track the solver's own
    /// scoping, not just accumulate for the life of the facade.
    #[test]
    fn test_pop_restores_declared_set_from_before_the_matching_push() {
        let state = Rc::new(RefCell::new(FakeBackendState::default()));
        let mut solver = Solver::new(Box::new(FakeBackend(state.clone())), "QF_BV", false).unwrap();
        let a = Expr::var(Symbol::new("a", Sort::Bool));
        let b = Expr::var(Symbol::new("b", Sort::Bool));

        solver.add_assertion(&a).unwrap();
        solver.push().unwrap();
        solver.add_assertion(&b).unwrap();
        solver.pop().unwrap();

        // b was only declared inside the popped scope; asserting it again must
        // declare it a second time.
        solver.add_assertion(&b).unwrap();
        assert_eq!(
            state.borrow().declared.iter().filter(|n| *n == "b").count(),
            2
        );
        // a was declared before the push and survives the pop untouched.
        solver.add_assertion(&a).unwrap();
        assert_eq!(
            state.borrow().declared.iter().filter(|n| *n == "a").count(),
            1
        );
    }

    #[test]
    fn test_reset_assertions_clears_declared_set() {
        let state = Rc::new(RefCell::new(FakeBackendState::default()));
        let mut solver = Solver::new(Box::new(FakeBackend(state.clone())), "QF_BV", false).unwrap();
        let a = Expr::var(Symbol::new("a", Sort::Bool));
        solver.add_assertion(&a).unwrap();
        solver.reset_assertions().unwrap();
        // a fresh assertion of the same symbol must declare it again
        solver.add_assertion(&a).unwrap();
        assert_eq!(
            state.borrow().declared.iter().filter(|n| *n == "a").count(),
            1
        );
    }
}
