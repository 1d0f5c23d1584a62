use crate::ast::Program;
use crate::diagnostics::{Diagnostic, Span};

mod checker;
mod constraint;
mod funcs;
mod meta;
mod poly;
mod scc;
mod store;

pub use checker::{Constructor, TypedProgram};
pub use constraint::Shape;
pub use funcs::{FuncId, FuncTag, Strength};
pub use meta::MetaType;
pub use poly::PolyId;
pub use store::MonoId;

/// Everything the checker can reject. Checking stops at the first error;
/// the driver decides whether to exit or render the diagnostic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("arity mismatch: `{func}` expects {expected} arguments, found {found}")]
    ArityMismatch {
        func: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("cannot construct the infinite type")]
    OccursCheck { span: Span },
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    FuncClash {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("accessing non-existing field `{field}` on `{on}`")]
    MissingField {
        field: String,
        on: String,
        span: Span,
    },
    #[error("metatype conflict: {message}")]
    MetaConflict { message: String, span: Span },
    #[error("unresolvable declaration cycle: {names}")]
    MetaCycle { names: String, span: Span },
    #[error("value used both as a record and as a variant")]
    ShapeConflict { span: Span },
    #[error("declaration cycle mixes types and values: {names}")]
    MixedCycle { names: String, span: Span },
    #[error("constructors cannot be stored in variables: `{name}`")]
    ConstructorBinding { name: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> &Span {
        match self {
            TypeError::ArityMismatch { span, .. }
            | TypeError::OccursCheck { span }
            | TypeError::FuncClash { span, .. }
            | TypeError::MissingField { span, .. }
            | TypeError::MetaConflict { span, .. }
            | TypeError::MetaCycle { span, .. }
            | TypeError::ShapeConflict { span }
            | TypeError::MixedCycle { span, .. }
            | TypeError::ConstructorBinding { span, .. } => span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TypeError::ArityMismatch { .. } => "E0701",
            TypeError::OccursCheck { .. } => "E0702",
            TypeError::FuncClash { .. } => "E0703",
            TypeError::MissingField { .. } => "E0704",
            TypeError::MetaConflict { .. } => "E0705",
            TypeError::MetaCycle { .. } => "E0706",
            TypeError::ShapeConflict { .. } => "E0707",
            TypeError::MixedCycle { .. } => "E0708",
            TypeError::ConstructorBinding { .. } => "E0709",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            code: self.code().to_string(),
            message: self.to_string(),
            span: self.span().clone(),
            labels: Vec::new(),
        }
    }
}

/// Run the metatype classifier and the type checker over a symbol-resolved
/// program. Both passes process declarations in dependency (SCC) order.
pub fn check_program(program: &Program) -> Result<TypedProgram, TypeError> {
    let meta = meta::classify(program)?;
    checker::Checker::run(program, meta)
}
