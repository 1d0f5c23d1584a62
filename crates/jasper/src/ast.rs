use crate::diagnostics::Span;

mod builder;

pub use builder::ProgramBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Builtin type names seeded into every program by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    Int,
    Float,
    Str,
    Unit,
    Array,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    /// `name := expr`, either top level or bound inside a sequence block.
    Value(ExprId),
    /// A function formal parameter or a match-case binding.
    Param,
    /// A builtin type name (`int`, `array`, ...).
    BuiltinType(BuiltinType),
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub kind: DeclKind,
    /// Top-level declarations this declaration syntactically mentions,
    /// gathered during symbol resolution.
    pub references: Vec<DeclId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub variant: String,
    pub binding: Option<DeclId>,
    pub body: ExprId,
}

#[derive(Debug, Clone)]
pub enum SeqItem {
    Bind(DeclId),
    Expr(ExprId),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Unit,
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<ExprId>),
    Function {
        params: Vec<DeclId>,
        body: ExprId,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Index {
        base: ExprId,
        index: ExprId,
    },
    Access {
        base: ExprId,
        field: String,
    },
    Match {
        scrutinee: ExprId,
        cases: Vec<MatchCase>,
    },
    Ternary {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    Record {
        fields: Vec<(String, ExprId)>,
    },
    Seq {
        items: Vec<SeqItem>,
    },
    StructType {
        fields: Vec<(String, ExprId)>,
    },
    UnionType {
        variants: Vec<(String, ExprId)>,
    },
    TypeApply {
        base: ExprId,
        args: Vec<ExprId>,
    },
    Ident(DeclId),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// A symbol-resolved compilation unit, as handed over by the parser and
/// resolver. Declarations and expressions live in arena vectors and refer
/// to each other by index.
#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub exprs: Vec<Expr>,
    pub top_level: Vec<DeclId>,
}

impl Program {
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn decl_value(&self, id: DeclId) -> Option<ExprId> {
        match self.decl(id).kind {
            DeclKind::Value(expr) => Some(expr),
            _ => None,
        }
    }
}
