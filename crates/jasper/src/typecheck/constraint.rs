use std::collections::BTreeMap;

use super::store::MonoId;

/// What a structural constraint has committed an unresolved variable to.
/// `.field` access forces `Record`, a match case forces `Variant`; forcing
/// both on one variable is a shape conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shape {
    #[default]
    Unknown,
    Record,
    Variant,
}

/// Partial field knowledge attached to an unresolved variable. Travels with
/// the variable through the union-find and is validated against the concrete
/// type function once the variable resolves to a term.
#[derive(Debug, Clone, Default)]
pub(crate) struct Constraint {
    pub shape: Shape,
    pub fields: BTreeMap<String, MonoId>,
}
