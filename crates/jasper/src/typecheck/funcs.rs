use std::collections::BTreeMap;

use crate::diagnostics::Span;

use super::store::MonoId;
use super::TypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncTag {
    Builtin,
    Record,
    Variant,
}

/// How concrete a type function is. `None` only pins an arity during term
/// construction, `Half` is a structurally inferred dummy that is still open,
/// `Full` is user-declared or builtin and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    None,
    Half,
    Full,
}

#[derive(Debug, Clone)]
struct TypeFunc {
    name: String,
    arity: i32,
    tag: FuncTag,
    strength: Strength,
    structure: BTreeMap<String, MonoId>,
    parent: FuncId,
}

/// The catalogue of type constructors: builtins plus user records/variants
/// plus inference dummies, with a union-find of its own so structural
/// unification can alias weaker functions to stronger ones.
#[derive(Debug)]
pub struct FuncRegistry {
    funcs: Vec<TypeFunc>,
    pub(crate) int: FuncId,
    pub(crate) float: FuncId,
    pub(crate) string: FuncId,
    pub(crate) unit: FuncId,
    pub(crate) array: FuncId,
    pub(crate) function: FuncId,
}

impl FuncRegistry {
    pub fn new() -> Self {
        let mut registry = FuncRegistry {
            funcs: Vec::new(),
            int: FuncId(0),
            float: FuncId(0),
            string: FuncId(0),
            unit: FuncId(0),
            array: FuncId(0),
            function: FuncId(0),
        };
        registry.int = registry.alloc("int", 0, FuncTag::Builtin, Strength::Full);
        registry.float = registry.alloc("float", 0, FuncTag::Builtin, Strength::Full);
        registry.string = registry.alloc("string", 0, FuncTag::Builtin, Strength::Full);
        registry.unit = registry.alloc("unit", 0, FuncTag::Builtin, Strength::Full);
        registry.array = registry.alloc("array", 1, FuncTag::Builtin, Strength::Full);
        registry.function = registry.alloc("fn", -1, FuncTag::Builtin, Strength::Full);
        registry
    }

    fn alloc(&mut self, name: &str, arity: i32, tag: FuncTag, strength: Strength) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(TypeFunc {
            name: name.to_string(),
            arity,
            tag,
            strength,
            structure: BTreeMap::new(),
            parent: id,
        });
        id
    }

    /// A user-declared record or variant, closed from the start.
    pub fn new_full(
        &mut self,
        name: &str,
        tag: FuncTag,
        structure: BTreeMap<String, MonoId>,
    ) -> FuncId {
        let id = self.alloc(name, 0, tag, Strength::Full);
        self.funcs[id.0 as usize].structure = structure;
        id
    }

    /// An inference dummy built from a partial field map.
    pub(crate) fn new_half(&mut self, tag: FuncTag, structure: BTreeMap<String, MonoId>) -> FuncId {
        let name = match tag {
            FuncTag::Variant => "variant",
            _ => "record",
        };
        let id = self.alloc(name, 0, tag, Strength::Half);
        self.funcs[id.0 as usize].structure = structure;
        id
    }

    /// A placeholder that only pins an arity; `-1` leaves it unconstrained.
    #[allow(dead_code)]
    pub fn new_placeholder(&mut self, arity: i32) -> FuncId {
        self.alloc("_", arity, FuncTag::Builtin, Strength::None)
    }

    pub(crate) fn set_structure(&mut self, id: FuncId, structure: BTreeMap<String, MonoId>) {
        let rep = self.find(id);
        self.funcs[rep.0 as usize].structure = structure;
    }

    pub(crate) fn clone_with_structure(
        &mut self,
        id: FuncId,
        structure: BTreeMap<String, MonoId>,
    ) -> FuncId {
        let rep = self.resolve(id);
        let template = self.funcs[rep.0 as usize].clone();
        let fresh = self.alloc(&template.name, template.arity, template.tag, template.strength);
        self.funcs[fresh.0 as usize].structure = structure;
        fresh
    }

    pub fn find(&mut self, id: FuncId) -> FuncId {
        let root = self.resolve(id);
        let mut cursor = id;
        while cursor != root {
            let next = self.funcs[cursor.0 as usize].parent;
            self.funcs[cursor.0 as usize].parent = root;
            cursor = next;
        }
        root
    }

    /// `find` without path compression, for immutable contexts.
    pub(crate) fn resolve(&self, id: FuncId) -> FuncId {
        let mut cursor = id;
        loop {
            let parent = self.funcs[cursor.0 as usize].parent;
            if parent == cursor {
                return cursor;
            }
            cursor = parent;
        }
    }

    pub fn name_of(&self, id: FuncId) -> &str {
        &self.funcs[self.resolve(id).0 as usize].name
    }

    pub fn arity_of(&self, id: FuncId) -> i32 {
        self.funcs[self.resolve(id).0 as usize].arity
    }

    pub fn tag_of(&self, id: FuncId) -> FuncTag {
        self.funcs[self.resolve(id).0 as usize].tag
    }

    pub fn strength_of(&self, id: FuncId) -> Strength {
        self.funcs[self.resolve(id).0 as usize].strength
    }

    pub(crate) fn structure_of(&self, id: FuncId) -> &BTreeMap<String, MonoId> {
        &self.funcs[self.resolve(id).0 as usize].structure
    }

    pub(crate) fn field_of(&self, id: FuncId, name: &str) -> Option<MonoId> {
        self.structure_of(id).get(name).copied()
    }

    pub(crate) fn insert_field(&mut self, id: FuncId, name: &str, ty: MonoId) {
        let rep = self.find(id);
        self.funcs[rep.0 as usize]
            .structure
            .insert(name.to_string(), ty);
    }

    /// Structural unification of two type functions. The weaker side is
    /// aliased to the stronger one; field pairs that still need monotype
    /// unification are returned for the caller's work list.
    pub(crate) fn merge(
        &mut self,
        a: FuncId,
        b: FuncId,
        span: &Span,
    ) -> Result<Vec<(MonoId, MonoId)>, TypeError> {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return Ok(Vec::new());
        }

        let sa = self.funcs[ra.0 as usize].strength;
        let sb = self.funcs[rb.0 as usize].strength;
        if sa == Strength::Full && sb == Strength::Full {
            return Err(TypeError::FuncClash {
                expected: self.funcs[ra.0 as usize].name.clone(),
                found: self.funcs[rb.0 as usize].name.clone(),
                span: span.clone(),
            });
        }

        // Weaker side becomes the dummy; on equal strength the smaller id
        // survives.
        let (weak, strong) = if sa < sb {
            (ra, rb)
        } else if sb < sa {
            (rb, ra)
        } else if ra < rb {
            (rb, ra)
        } else {
            (ra, rb)
        };

        if self.funcs[weak.0 as usize].strength == Strength::None {
            let weak_arity = self.funcs[weak.0 as usize].arity;
            let strong_arity = self.funcs[strong.0 as usize].arity;
            if weak_arity >= 0 && strong_arity >= 0 && weak_arity != strong_arity {
                return Err(TypeError::ArityMismatch {
                    func: self.funcs[strong.0 as usize].name.clone(),
                    expected: strong_arity as usize,
                    found: weak_arity as usize,
                    span: span.clone(),
                });
            }
            self.funcs[weak.0 as usize].parent = strong;
            return Ok(Vec::new());
        }

        // The weak side is a Half dummy.
        let weak_tag = self.funcs[weak.0 as usize].tag;
        let strong_tag = self.funcs[strong.0 as usize].tag;
        match (weak_tag, strong_tag) {
            (FuncTag::Record, FuncTag::Variant) | (FuncTag::Variant, FuncTag::Record) => {
                return Err(TypeError::ShapeConflict { span: span.clone() });
            }
            (_, FuncTag::Builtin) => {
                return Err(TypeError::FuncClash {
                    expected: self.funcs[strong.0 as usize].name.clone(),
                    found: self.funcs[weak.0 as usize].name.clone(),
                    span: span.clone(),
                });
            }
            _ => {}
        }

        let weak_fields = self.funcs[weak.0 as usize].structure.clone();
        let strong_full = self.funcs[strong.0 as usize].strength == Strength::Full;
        let mut pairs = Vec::new();
        for (name, ty) in weak_fields {
            if let Some(other) = self.funcs[strong.0 as usize].structure.get(&name) {
                pairs.push((ty, *other));
            } else if strong_full {
                return Err(TypeError::MissingField {
                    field: name,
                    on: self.funcs[strong.0 as usize].name.clone(),
                    span: span.clone(),
                });
            } else {
                self.funcs[strong.0 as usize].structure.insert(name, ty);
            }
        }
        self.funcs[weak.0 as usize].parent = strong;
        Ok(pairs)
    }
}

impl Default for FuncRegistry {
    fn default() -> Self {
        Self::new()
    }
}
