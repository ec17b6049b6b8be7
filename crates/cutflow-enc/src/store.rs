//! Versioned symbolic store threaded through an edge encoding.
//!
//! The store maps each program variable to the term currently denoting
//! its value. A variable read before any write denotes its version-0
//! input symbol; `havoc` rebinds the variable to a fresh symbol with
//! the next unused version. One store lives exactly as long as one
//! cutpoint-edge encoding.

use cutflow_cfg::cfg::{Procedure, VarId};
use indexmap::IndexMap;

use crate::terms::{TermFactory, TermId};

#[derive(Debug, Default)]
pub struct SymStore {
    bindings: IndexMap<VarId, TermId>,
    next_version: IndexMap<VarId, u32>,
}

impl SymStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The term currently bound to `var`, binding the version-0 input
    /// symbol on first read.
    pub fn read(
        &mut self,
        factory: &mut TermFactory,
        procedure: &Procedure,
        var: VarId,
    ) -> TermId {
        if let Some(&t) = self.bindings.get(&var) {
            return t;
        }
        let t = factory.mk_sym(procedure.var_name(var), 0);
        self.bindings.insert(var, t);
        *self.next_version.entry(var).or_insert(0) = 1;
        t
    }

    /// Rebinds `var` to `term`.
    pub fn write(&mut self, var: VarId, term: TermId) {
        self.bindings.insert(var, term);
    }

    /// Rebinds `var` to a fresh symbol and returns it.
    pub fn havoc(
        &mut self,
        factory: &mut TermFactory,
        procedure: &Procedure,
        var: VarId,
    ) -> TermId {
        let version = self.next_version.entry(var).or_insert(1);
        let t = factory.mk_sym(procedure.var_name(var), *version);
        *version += 1;
        self.bindings.insert(var, t);
        t
    }

    /// Current bindings in first-touch order.
    pub fn bindings(&self) -> impl Iterator<Item = (VarId, TermId)> + '_ {
        self.bindings.iter().map(|(&v, &t)| (v, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutflow_cfg::cfg::{ProcedureBuilder, Terminator};
    use crate::terms::Term;

    fn one_var() -> (Procedure, VarId) {
        let mut b = ProcedureBuilder::new("p");
        let x = b.var("x");
        let entry = b.block("entry");
        let exit = b.block("exit");
        b.fill(entry, vec![], Terminator::Goto(exit));
        b.fill(exit, vec![], Terminator::Return);
        (b.finish(entry, exit).unwrap(), x)
    }

    #[test]
    fn first_read_binds_the_input_symbol() {
        let (p, x) = one_var();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let t = s.read(&mut f, &p, x);
        assert_eq!(
            f.get(t),
            &Term::Sym {
                name: "x".into(),
                version: 0
            }
        );
        // Reads are stable.
        assert_eq!(s.read(&mut f, &p, x), t);
    }

    #[test]
    fn write_shadows_the_input() {
        let (p, x) = one_var();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let before = s.read(&mut f, &p, x);
        let five = f.mk_int(5);
        s.write(x, five);
        assert_eq!(s.read(&mut f, &p, x), five);
        assert_ne!(before, five);
    }

    #[test]
    fn havoc_produces_distinct_fresh_symbols() {
        let (p, x) = one_var();
        let mut f = TermFactory::new();
        let mut s = SymStore::new();
        let input = s.read(&mut f, &p, x);
        let h1 = s.havoc(&mut f, &p, x);
        let h2 = s.havoc(&mut f, &p, x);
        assert_ne!(h1, input);
        assert_ne!(h1, h2);
        assert_eq!(s.read(&mut f, &p, x), h2);
    }
}
