use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use crate::diagnostics::Span;

use super::constraint::{Constraint, Shape};
use super::funcs::{FuncId, FuncRegistry, FuncTag, Strength};
use super::TypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonoId(pub(crate) u32);

#[derive(Debug, Clone)]
pub(crate) struct Term {
    pub func: FuncId,
    pub args: Vec<MonoId>,
}

#[derive(Debug, Clone)]
struct MonoNode {
    parent: MonoId,
    term: Option<Term>,
}

/// The union-find substitution store. A node with no term and itself as
/// parent is an unresolved variable; unification links nodes so `find`
/// always lands on the current representative.
#[derive(Debug)]
pub struct SubstStore {
    nodes: Vec<MonoNode>,
    constraints: BTreeMap<MonoId, Constraint>,
}

impl SubstStore {
    pub fn new() -> Self {
        SubstStore {
            nodes: Vec::new(),
            constraints: BTreeMap::new(),
        }
    }

    pub fn new_var(&mut self) -> MonoId {
        let id = MonoId(self.nodes.len() as u32);
        self.nodes.push(MonoNode {
            parent: id,
            term: None,
        });
        id
    }

    /// A term application; fixed arities are enforced here, not in `unify`.
    pub fn new_term(
        &mut self,
        funcs: &FuncRegistry,
        func: FuncId,
        args: Vec<MonoId>,
        span: &Span,
    ) -> Result<MonoId, TypeError> {
        let arity = funcs.arity_of(func);
        if arity >= 0 && arity as usize != args.len() {
            return Err(TypeError::ArityMismatch {
                func: funcs.name_of(func).to_string(),
                expected: arity as usize,
                found: args.len(),
                span: span.clone(),
            });
        }
        Ok(self.term(func, args))
    }

    /// Term construction with the arity already validated by the caller.
    pub(crate) fn term(&mut self, func: FuncId, args: Vec<MonoId>) -> MonoId {
        let id = MonoId(self.nodes.len() as u32);
        self.nodes.push(MonoNode {
            parent: id,
            term: Some(Term { func, args }),
        });
        id
    }

    pub fn find(&mut self, id: MonoId) -> MonoId {
        let root = self.resolve(id);
        let mut cursor = id;
        while cursor != root {
            let next = self.nodes[cursor.0 as usize].parent;
            self.nodes[cursor.0 as usize].parent = root;
            cursor = next;
        }
        root
    }

    /// `find` without path compression, for immutable contexts.
    pub fn resolve(&self, id: MonoId) -> MonoId {
        let mut cursor = id;
        loop {
            let parent = self.nodes[cursor.0 as usize].parent;
            if parent == cursor {
                return cursor;
            }
            cursor = parent;
        }
    }

    pub(crate) fn term_of(&self, rep: MonoId) -> Option<&Term> {
        self.nodes[rep.0 as usize].term.as_ref()
    }

    pub(crate) fn constraint_of(&self, rep: MonoId) -> Option<&Constraint> {
        self.constraints.get(&rep)
    }

    pub(crate) fn install_constraint(&mut self, rep: MonoId, constraint: Constraint) {
        self.constraints.insert(rep, constraint);
    }

    /// Work-list unification; leaves `find(a) == find(b)` on success.
    pub fn unify(
        &mut self,
        funcs: &mut FuncRegistry,
        a: MonoId,
        b: MonoId,
        span: &Span,
    ) -> Result<(), TypeError> {
        let mut work = vec![(a, b)];
        while let Some((a, b)) = work.pop() {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra == rb {
                continue;
            }
            let term_a = self.nodes[ra.0 as usize].term.clone();
            let term_b = self.nodes[rb.0 as usize].term.clone();
            match (term_a, term_b) {
                (None, None) => {
                    let (survivor, loser) = if ra < rb { (ra, rb) } else { (rb, ra) };
                    self.merge_constraints(survivor, loser, span, &mut work)?;
                    self.nodes[loser.0 as usize].parent = survivor;
                }
                (None, Some(term)) => {
                    self.bind_var(funcs, ra, rb, &term, span, &mut work)?;
                }
                (Some(term), None) => {
                    self.bind_var(funcs, rb, ra, &term, span, &mut work)?;
                }
                (Some(ta), Some(tb)) => {
                    if funcs.find(ta.func) == funcs.find(tb.func) {
                        if ta.args.len() != tb.args.len() {
                            return Err(self.argument_count_error(funcs, &ta, &tb, span));
                        }
                        work.extend(ta.args.into_iter().zip(tb.args));
                    } else {
                        let pairs = funcs.merge(ta.func, tb.func, span)?;
                        work.extend(pairs);
                        if ta.args.len() == tb.args.len() {
                            work.extend(ta.args.into_iter().zip(tb.args));
                        } else if !ta.args.is_empty() && !tb.args.is_empty() {
                            return Err(self.argument_count_error(funcs, &ta, &tb, span));
                        }
                    }
                    self.nodes[ra.0 as usize].parent = rb;
                }
            }
        }
        Ok(())
    }

    /// Function terms carry the return type as a trailing argument slot; it
    /// is not part of the arity the user sees.
    fn argument_count_error(
        &self,
        funcs: &FuncRegistry,
        ta: &Term,
        tb: &Term,
        span: &Span,
    ) -> TypeError {
        let slot = usize::from(funcs.resolve(ta.func) == funcs.resolve(funcs.function));
        TypeError::ArityMismatch {
            func: funcs.name_of(ta.func).to_string(),
            expected: ta.args.len().saturating_sub(slot),
            found: tb.args.len().saturating_sub(slot),
            span: span.clone(),
        }
    }

    fn bind_var(
        &mut self,
        funcs: &mut FuncRegistry,
        var: MonoId,
        term_id: MonoId,
        term: &Term,
        span: &Span,
        work: &mut Vec<(MonoId, MonoId)>,
    ) -> Result<(), TypeError> {
        if self.occurs(funcs, var, term_id) {
            return Err(TypeError::OccursCheck { span: span.clone() });
        }
        if let Some(constraint) = self.constraints.remove(&var) {
            if constraint.shape != Shape::Unknown || !constraint.fields.is_empty() {
                let tag = match constraint.shape {
                    Shape::Variant => FuncTag::Variant,
                    _ => FuncTag::Record,
                };
                let dummy = funcs.new_half(tag, constraint.fields);
                let pairs = funcs.merge(dummy, term.func, span)?;
                work.extend(pairs);
            }
        }
        self.nodes[var.0 as usize].parent = term_id;
        Ok(())
    }

    /// Does `term` (a term representative) contain `var` anywhere below it?
    fn occurs(&mut self, funcs: &FuncRegistry, var: MonoId, term: MonoId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![term];
        while let Some(id) = stack.pop() {
            let rep = self.find(id);
            if !seen.insert(rep) {
                continue;
            }
            if rep == var {
                return true;
            }
            match &self.nodes[rep.0 as usize].term {
                Some(term) => {
                    stack.extend(term.args.iter().copied());
                    stack.extend(funcs.structure_of(term.func).values().copied());
                }
                None => {
                    if let Some(constraint) = self.constraints.get(&rep) {
                        stack.extend(constraint.fields.values().copied());
                    }
                }
            }
        }
        false
    }

    /// Left-to-right constraint merge: the loser's fields are filled into
    /// the survivor's so accumulated field knowledge is never lost.
    fn merge_constraints(
        &mut self,
        survivor: MonoId,
        loser: MonoId,
        span: &Span,
        work: &mut Vec<(MonoId, MonoId)>,
    ) -> Result<(), TypeError> {
        let Some(from) = self.constraints.remove(&loser) else {
            return Ok(());
        };
        match self.constraints.entry(survivor) {
            Entry::Vacant(entry) => {
                entry.insert(from);
            }
            Entry::Occupied(mut entry) => {
                let into = entry.get_mut();
                into.shape = match (into.shape, from.shape) {
                    (Shape::Unknown, shape) | (shape, Shape::Unknown) => shape,
                    (a, b) if a == b => a,
                    _ => return Err(TypeError::ShapeConflict { span: span.clone() }),
                };
                for (name, ty) in from.fields {
                    match into.fields.entry(name) {
                        Entry::Vacant(field) => {
                            field.insert(ty);
                        }
                        Entry::Occupied(field) => work.push((*field.get(), ty)),
                    }
                }
            }
        }
        Ok(())
    }

    pub fn constrain_record(&mut self, id: MonoId, span: &Span) -> Result<(), TypeError> {
        self.constrain_shape(id, Shape::Record, span)
    }

    pub fn constrain_variant(&mut self, id: MonoId, span: &Span) -> Result<(), TypeError> {
        self.constrain_shape(id, Shape::Variant, span)
    }

    fn constrain_shape(&mut self, id: MonoId, shape: Shape, span: &Span) -> Result<(), TypeError> {
        let rep = self.find(id);
        let constraint = self.constraints.entry(rep).or_default();
        if constraint.shape != Shape::Unknown && constraint.shape != shape {
            return Err(TypeError::ShapeConflict { span: span.clone() });
        }
        constraint.shape = shape;
        Ok(())
    }

    /// Record or unify a field expectation on an unresolved variable.
    pub fn constrain_field(
        &mut self,
        funcs: &mut FuncRegistry,
        id: MonoId,
        name: &str,
        ty: MonoId,
        span: &Span,
    ) -> Result<(), TypeError> {
        let rep = self.find(id);
        let constraint = self.constraints.entry(rep).or_default();
        match constraint.fields.entry(name.to_string()) {
            Entry::Vacant(field) => {
                field.insert(ty);
                Ok(())
            }
            Entry::Occupied(field) => {
                let existing = *field.get();
                self.unify(funcs, existing, ty, span)
            }
        }
    }

    fn field_constraint(&self, rep: MonoId, name: &str) -> Option<MonoId> {
        self.constraints
            .get(&rep)
            .and_then(|constraint| constraint.fields.get(name))
            .copied()
    }

    /// The type of `.name` on `base`, constraining or widening as needed.
    pub fn record_field(
        &mut self,
        funcs: &mut FuncRegistry,
        base: MonoId,
        name: &str,
        span: &Span,
    ) -> Result<MonoId, TypeError> {
        let rep = self.find(base);
        let Some(term) = self.nodes[rep.0 as usize].term.clone() else {
            self.constrain_record(rep, span)?;
            if let Some(existing) = self.field_constraint(rep, name) {
                return Ok(existing);
            }
            let fresh = self.new_var();
            self.constrain_field(funcs, rep, name, fresh, span)?;
            return Ok(fresh);
        };
        let func = funcs.find(term.func);
        match funcs.tag_of(func) {
            FuncTag::Record => {
                if let Some(existing) = funcs.field_of(func, name) {
                    Ok(existing)
                } else if funcs.strength_of(func) == Strength::Full {
                    Err(TypeError::MissingField {
                        field: name.to_string(),
                        on: funcs.name_of(func).to_string(),
                        span: span.clone(),
                    })
                } else {
                    let fresh = self.new_var();
                    funcs.insert_field(func, name, fresh);
                    Ok(fresh)
                }
            }
            FuncTag::Variant => Err(TypeError::ShapeConflict { span: span.clone() }),
            FuncTag::Builtin => Err(TypeError::MissingField {
                field: name.to_string(),
                on: funcs.name_of(func).to_string(),
                span: span.clone(),
            }),
        }
    }

    /// The payload type of case `name` when `base` is matched as a variant.
    pub fn variant_case(
        &mut self,
        funcs: &mut FuncRegistry,
        base: MonoId,
        name: &str,
        span: &Span,
    ) -> Result<MonoId, TypeError> {
        let rep = self.find(base);
        let Some(term) = self.nodes[rep.0 as usize].term.clone() else {
            self.constrain_variant(rep, span)?;
            if let Some(existing) = self.field_constraint(rep, name) {
                return Ok(existing);
            }
            let fresh = self.new_var();
            self.constrain_field(funcs, rep, name, fresh, span)?;
            return Ok(fresh);
        };
        let func = funcs.find(term.func);
        match funcs.tag_of(func) {
            FuncTag::Variant => {
                if let Some(existing) = funcs.field_of(func, name) {
                    Ok(existing)
                } else if funcs.strength_of(func) == Strength::Full {
                    Err(TypeError::MissingField {
                        field: name.to_string(),
                        on: funcs.name_of(func).to_string(),
                        span: span.clone(),
                    })
                } else {
                    let fresh = self.new_var();
                    funcs.insert_field(func, name, fresh);
                    Ok(fresh)
                }
            }
            FuncTag::Record => Err(TypeError::ShapeConflict { span: span.clone() }),
            FuncTag::Builtin => Err(TypeError::FuncClash {
                expected: "variant".to_string(),
                found: funcs.name_of(func).to_string(),
                span: span.clone(),
            }),
        }
    }
}

impl Default for SubstStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SubstStore, FuncRegistry, Span) {
        (SubstStore::new(), FuncRegistry::new(), Span::default())
    }

    #[test]
    fn find_is_idempotent() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let b = store.new_var();
        let int = store.term(funcs.int, vec![]);
        store.unify(&mut funcs, a, b, &span).unwrap();
        store.unify(&mut funcs, b, int, &span).unwrap();
        for id in [a, b, int] {
            let once = store.find(id);
            assert_eq!(store.find(once), once);
        }
    }

    #[test]
    fn unify_is_symmetric() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let int = store.term(funcs.int, vec![]);
        let left = store.term(funcs.array, vec![a]);
        let b = store.new_var();
        let right = store.term(funcs.array, vec![b]);
        store.unify(&mut funcs, right, left, &span).unwrap();
        store.unify(&mut funcs, b, int, &span).unwrap();
        assert_eq!(store.find(left), store.find(right));
        assert_eq!(store.find(a), store.find(int));
    }

    #[test]
    fn var_var_link_keeps_smaller_id() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let b = store.new_var();
        store.unify(&mut funcs, b, a, &span).unwrap();
        assert_eq!(store.find(b), a);
    }

    #[test]
    fn occurs_check_rejects_infinite_type() {
        let (mut store, mut funcs, span) = setup();
        let v = store.new_var();
        let wrapped = store.term(funcs.array, vec![v]);
        let err = store.unify(&mut funcs, v, wrapped, &span).unwrap_err();
        assert!(matches!(err, TypeError::OccursCheck { .. }));
    }

    #[test]
    fn occurs_check_sees_nested_arguments() {
        let (mut store, mut funcs, span) = setup();
        let v = store.new_var();
        let inner = store.term(funcs.array, vec![v]);
        let ret = store.new_var();
        let outer = store.term(funcs.function, vec![inner, ret]);
        let err = store.unify(&mut funcs, v, outer, &span).unwrap_err();
        assert!(matches!(err, TypeError::OccursCheck { .. }));
    }

    #[test]
    fn distinct_builtins_clash() {
        let (mut store, mut funcs, span) = setup();
        let int = store.term(funcs.int, vec![]);
        let string = store.term(funcs.string, vec![]);
        let err = store.unify(&mut funcs, int, string, &span).unwrap_err();
        assert!(matches!(err, TypeError::FuncClash { .. }));
    }

    #[test]
    fn function_argument_count_mismatch_is_an_arity_error() {
        let (mut store, mut funcs, span) = setup();
        let int = store.term(funcs.int, vec![]);
        let one = store.term(funcs.function, vec![int, int]);
        let two = store.term(funcs.function, vec![int, int, int]);
        let err = store.unify(&mut funcs, one, two, &span).unwrap_err();
        // Counts exclude the trailing return slot.
        match err {
            TypeError::ArityMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected ArityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn fixed_arity_is_enforced_at_construction() {
        let (mut store, funcs, span) = setup();
        let err = store
            .new_term(&funcs, funcs.array, vec![], &span)
            .unwrap_err();
        assert!(matches!(err, TypeError::ArityMismatch { .. }));
    }

    #[test]
    fn constraints_survive_var_var_union() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let b = store.new_var();
        let field_a = store.record_field(&mut funcs, a, "x", &span).unwrap();
        let field_b = store.record_field(&mut funcs, b, "y", &span).unwrap();
        store.unify(&mut funcs, a, b, &span).unwrap();
        let rep = store.find(a);
        let constraint = store.constraint_of(rep).unwrap().clone();
        assert_eq!(constraint.fields.len(), 2);
        assert_eq!(store.find(constraint.fields["x"]), store.find(field_a));
        assert_eq!(store.find(constraint.fields["y"]), store.find(field_b));
    }

    #[test]
    fn shared_field_is_unified_on_union() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let b = store.new_var();
        let field_a = store.record_field(&mut funcs, a, "x", &span).unwrap();
        let field_b = store.record_field(&mut funcs, b, "x", &span).unwrap();
        let int = store.term(funcs.int, vec![]);
        store.unify(&mut funcs, field_a, int, &span).unwrap();
        store.unify(&mut funcs, a, b, &span).unwrap();
        assert_eq!(store.find(field_b), store.find(int));
    }

    #[test]
    fn record_and_variant_shapes_conflict() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        store.record_field(&mut funcs, a, "x", &span).unwrap();
        let err = store.variant_case(&mut funcs, a, "A", &span).unwrap_err();
        assert!(matches!(err, TypeError::ShapeConflict { .. }));
    }

    #[test]
    fn constraint_validates_against_full_record() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        let field = store.record_field(&mut funcs, a, "x", &span).unwrap();
        let int = store.term(funcs.int, vec![]);
        let mut structure = std::collections::BTreeMap::new();
        structure.insert("x".to_string(), int);
        let full = funcs.new_full("point", FuncTag::Record, structure);
        let concrete = store.term(full, vec![]);
        store.unify(&mut funcs, a, concrete, &span).unwrap();
        assert_eq!(store.find(field), store.find(int));
    }

    #[test]
    fn constraint_missing_on_full_record_fails() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        store.record_field(&mut funcs, a, "y", &span).unwrap();
        let int = store.term(funcs.int, vec![]);
        let mut structure = std::collections::BTreeMap::new();
        structure.insert("x".to_string(), int);
        let full = funcs.new_full("point", FuncTag::Record, structure);
        let concrete = store.term(full, vec![]);
        let err = store.unify(&mut funcs, a, concrete, &span).unwrap_err();
        assert!(matches!(err, TypeError::MissingField { .. }));
    }

    #[test]
    fn field_access_on_builtin_fails() {
        let (mut store, mut funcs, span) = setup();
        let a = store.new_var();
        store.record_field(&mut funcs, a, "x", &span).unwrap();
        let int = store.term(funcs.int, vec![]);
        let err = store.unify(&mut funcs, a, int, &span).unwrap_err();
        assert!(matches!(err, TypeError::FuncClash { .. }));
    }

    #[test]
    fn half_dummies_take_a_symmetric_field_union() {
        let (mut store, mut funcs, span) = setup();
        let int = store.term(funcs.int, vec![]);
        let string = store.term(funcs.string, vec![]);
        let mut left_fields = std::collections::BTreeMap::new();
        left_fields.insert("x".to_string(), int);
        let left = funcs.new_half(FuncTag::Record, left_fields);
        let mut right_fields = std::collections::BTreeMap::new();
        right_fields.insert("y".to_string(), string);
        let right = funcs.new_half(FuncTag::Record, right_fields);
        let a = store.term(left, vec![]);
        let b = store.term(right, vec![]);
        store.unify(&mut funcs, a, b, &span).unwrap();
        let merged = funcs.find(left);
        assert_eq!(merged, funcs.find(right));
        assert_eq!(funcs.field_of(merged, "x"), Some(int));
        assert_eq!(funcs.field_of(merged, "y"), Some(string));
    }

    #[test]
    fn placeholder_pins_arity() {
        let (mut store, mut funcs, span) = setup();
        let pinned = funcs.new_placeholder(2);
        let a = store.new_var();
        let b = store.new_var();
        let c = store.new_var();
        let term = store.term(pinned, vec![a, b]);
        let arr = store.term(funcs.array, vec![c]);
        let err = store.unify(&mut funcs, term, arr, &span).unwrap_err();
        assert!(matches!(err, TypeError::ArityMismatch { .. }));
    }
}
