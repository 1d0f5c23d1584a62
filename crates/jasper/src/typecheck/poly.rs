use std::collections::{BTreeMap, HashMap, HashSet};

use crate::diagnostics::Span;

use super::constraint::Constraint;
use super::funcs::FuncRegistry;
use super::store::{MonoId, SubstStore};
use super::TypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolyId(pub(crate) u32);

/// A generalized type: `vars` are universally quantified, every other
/// variable of `base` stays free and is shared across instantiations.
#[derive(Debug, Clone)]
pub struct Poly {
    pub base: MonoId,
    pub vars: Vec<MonoId>,
}

#[derive(Debug)]
pub struct PolyTable {
    polys: Vec<Poly>,
}

impl PolyTable {
    pub fn new() -> Self {
        PolyTable { polys: Vec::new() }
    }

    pub fn push(&mut self, poly: Poly) -> PolyId {
        let id = PolyId(self.polys.len() as u32);
        self.polys.push(poly);
        id
    }

    pub fn get(&self, id: PolyId) -> &Poly {
        &self.polys[id.0 as usize]
    }
}

impl Default for PolyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Variables owned by enclosing, as-yet-unresolved function signatures.
/// Generalization never quantifies a scope-bound variable.
pub(crate) struct ScopeStack {
    scopes: Vec<Vec<MonoId>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        // The root scope holds free variables of non-generalizable
        // top-level bindings.
        ScopeStack {
            scopes: vec![Vec::new()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    pub fn bind(&mut self, var: MonoId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(var);
        }
    }

    fn reps(&self, store: &mut SubstStore) -> HashSet<MonoId> {
        let mut reps = HashSet::new();
        for scope in &self.scopes {
            for &var in scope {
                reps.insert(store.find(var));
            }
        }
        reps
    }
}

/// Unresolved variables reachable from `root`, in first-visit order.
/// Descends through term arguments, type function structures, and the
/// constraint field maps of unresolved variables.
pub(crate) fn gather_free_vars(
    store: &mut SubstStore,
    funcs: &FuncRegistry,
    root: MonoId,
) -> Vec<MonoId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let rep = store.find(id);
        if !seen.insert(rep) {
            continue;
        }
        match store.term_of(rep) {
            Some(term) => {
                let func = funcs.resolve(term.func);
                stack.extend(term.args.iter().copied());
                stack.extend(funcs.structure_of(func).values().copied());
            }
            None => {
                out.push(rep);
                if let Some(constraint) = store.constraint_of(rep) {
                    stack.extend(constraint.fields.values().copied());
                }
            }
        }
    }
    out
}

/// Quantify the free variables of `base` that no enclosing scope owns.
pub(crate) fn generalize(
    store: &mut SubstStore,
    funcs: &FuncRegistry,
    scopes: &ScopeStack,
    base: MonoId,
) -> Poly {
    let bound = scopes.reps(store);
    let vars = gather_free_vars(store, funcs, base)
        .into_iter()
        .filter(|rep| !bound.contains(rep))
        .collect();
    Poly { base, vars }
}

/// Instantiate with fresh variables for every quantified variable.
pub(crate) fn instantiate(store: &mut SubstStore, funcs: &mut FuncRegistry, poly: &Poly) -> MonoId {
    instantiate_inner(store, funcs, poly).0
}

/// Instantiate substituting caller-supplied types for the quantified
/// variables, in `Poly::vars` order.
pub(crate) fn instantiate_with(
    store: &mut SubstStore,
    funcs: &mut FuncRegistry,
    poly: &Poly,
    vals: &[MonoId],
    span: &Span,
) -> Result<MonoId, TypeError> {
    if vals.len() != poly.vars.len() {
        return Err(TypeError::ArityMismatch {
            func: "instantiation".to_string(),
            expected: poly.vars.len(),
            found: vals.len(),
            span: span.clone(),
        });
    }
    let (mono, map) = instantiate_inner(store, funcs, poly);
    for (var, &val) in poly.vars.iter().zip(vals) {
        let rep = store.find(*var);
        if let Some(&fresh) = map.get(&rep) {
            store.unify(funcs, fresh, val, span)?;
        }
    }
    Ok(mono)
}

fn instantiate_inner(
    store: &mut SubstStore,
    funcs: &mut FuncRegistry,
    poly: &Poly,
) -> (MonoId, HashMap<MonoId, MonoId>) {
    let quantified: HashSet<MonoId> = poly.vars.iter().map(|&v| store.find(v)).collect();
    let mut map = HashMap::new();
    let mono = copy_mono(store, funcs, &quantified, &mut map, poly.base);
    (mono, map)
}

fn copy_mono(
    store: &mut SubstStore,
    funcs: &mut FuncRegistry,
    quantified: &HashSet<MonoId>,
    map: &mut HashMap<MonoId, MonoId>,
    id: MonoId,
) -> MonoId {
    let rep = store.find(id);
    if let Some(&copied) = map.get(&rep) {
        return copied;
    }
    match store.term_of(rep).cloned() {
        None => {
            if !quantified.contains(&rep) {
                return rep;
            }
            let fresh = store.new_var();
            map.insert(rep, fresh);
            if let Some(constraint) = store.constraint_of(rep).cloned() {
                let mut fields = BTreeMap::new();
                for (name, ty) in constraint.fields {
                    fields.insert(name, copy_mono(store, funcs, quantified, map, ty));
                }
                store.install_constraint(
                    fresh,
                    Constraint {
                        shape: constraint.shape,
                        fields,
                    },
                );
            }
            fresh
        }
        Some(term) => {
            let mut changed = false;
            let mut args = Vec::with_capacity(term.args.len());
            for &arg in &term.args {
                let copied = copy_mono(store, funcs, quantified, map, arg);
                changed |= copied != store.find(arg);
                args.push(copied);
            }
            let func = funcs.resolve(term.func);
            let structure = funcs.structure_of(func).clone();
            let mut new_structure = BTreeMap::new();
            let mut func_changed = false;
            for (name, ty) in structure {
                let copied = copy_mono(store, funcs, quantified, map, ty);
                func_changed |= copied != store.find(ty);
                new_structure.insert(name, copied);
            }
            if !changed && !func_changed {
                return rep;
            }
            let func = if func_changed {
                funcs.clone_with_structure(func, new_structure)
            } else {
                func
            };
            store.term(func, args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SubstStore, FuncRegistry, ScopeStack, Span) {
        (
            SubstStore::new(),
            FuncRegistry::new(),
            ScopeStack::new(),
            Span::default(),
        )
    }

    #[test]
    fn closed_monotype_round_trips() {
        let (mut store, mut funcs, scopes, span) = setup();
        let int = store.term(funcs.int, vec![]);
        let ty = store.term(funcs.array, vec![int]);
        let poly = generalize(&mut store, &funcs, &scopes, ty);
        assert!(poly.vars.is_empty());
        let inst = instantiate(&mut store, &mut funcs, &poly);
        store.unify(&mut funcs, inst, ty, &span).unwrap();
        assert_eq!(store.find(inst), store.find(ty));
    }

    #[test]
    fn instantiations_are_independent() {
        let (mut store, mut funcs, scopes, span) = setup();
        let a = store.new_var();
        let ty = store.term(funcs.function, vec![a, a]);
        let poly = generalize(&mut store, &funcs, &scopes, ty);
        assert_eq!(poly.vars.len(), 1);

        let first = instantiate(&mut store, &mut funcs, &poly);
        let second = instantiate(&mut store, &mut funcs, &poly);
        let int = store.term(funcs.int, vec![]);
        let string = store.term(funcs.string, vec![]);
        let ret1 = store.new_var();
        let ret2 = store.new_var();
        let want_int = store.term(funcs.function, vec![int, ret1]);
        let want_string = store.term(funcs.function, vec![string, ret2]);
        store.unify(&mut funcs, first, want_int, &span).unwrap();
        store.unify(&mut funcs, second, want_string, &span).unwrap();
        assert_eq!(store.find(ret1), store.find(int));
        assert_eq!(store.find(ret2), store.find(string));
    }

    #[test]
    fn scope_bound_variables_stay_free() {
        let (mut store, mut funcs, mut scopes, span) = setup();
        let outer = store.new_var();
        scopes.push();
        scopes.bind(outer);
        let ret = store.new_var();
        let ty = store.term(funcs.function, vec![outer, ret]);
        let poly = generalize(&mut store, &funcs, &scopes, ty);
        assert_eq!(poly.vars.len(), 1);
        assert_eq!(store.find(poly.vars[0]), store.find(ret));

        // The shared variable really is shared across instantiations.
        let first = instantiate(&mut store, &mut funcs, &poly);
        let int = store.term(funcs.int, vec![]);
        let fresh = store.new_var();
        let want = store.term(funcs.function, vec![int, fresh]);
        store.unify(&mut funcs, first, want, &span).unwrap();
        assert_eq!(store.find(outer), store.find(int));
    }

    #[test]
    fn constraints_are_copied_per_instantiation() {
        let (mut store, mut funcs, scopes, span) = setup();
        let arg = store.new_var();
        let field = store.record_field(&mut funcs, arg, "y", &span).unwrap();
        let ty = store.term(funcs.function, vec![arg, field]);
        let poly = generalize(&mut store, &funcs, &scopes, ty);
        assert_eq!(poly.vars.len(), 2);

        let inst = instantiate(&mut store, &mut funcs, &poly);
        let inst_rep = store.find(inst);
        let inst_arg = store.term_of(inst_rep).unwrap().args[0];
        assert_ne!(store.find(inst_arg), store.find(arg));
        let inst_arg_rep = store.find(inst_arg);
        let constraint = store.constraint_of(inst_arg_rep).unwrap();
        assert!(constraint.fields.contains_key("y"));
    }

    #[test]
    fn instantiate_with_substitutes_supplied_types() {
        let (mut store, mut funcs, scopes, span) = setup();
        let a = store.new_var();
        let ty = store.term(funcs.function, vec![a, a]);
        let poly = generalize(&mut store, &funcs, &scopes, ty);
        let int = store.term(funcs.int, vec![]);
        let inst = instantiate_with(&mut store, &mut funcs, &poly, &[int], &span).unwrap();
        let rep = store.find(inst);
        let args = store.term_of(rep).unwrap().args.clone();
        assert_eq!(store.find(args[0]), store.find(int));
        assert_eq!(store.find(args[1]), store.find(int));
    }
}
