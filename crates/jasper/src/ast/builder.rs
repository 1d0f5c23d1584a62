use std::collections::BTreeSet;

use crate::diagnostics::Span;

use super::{
    BuiltinType, Decl, DeclId, DeclKind, Expr, ExprId, ExprKind, MatchCase, Program, SeqItem,
};

/// Programmatic construction of a symbol-resolved [`Program`], used by the
/// CST lowering and by tests. Builtin type names are seeded up front;
/// `references` sets are computed from resolved identifiers on `define`.
pub struct ProgramBuilder {
    decls: Vec<Decl>,
    exprs: Vec<Expr>,
    top_level: Vec<DeclId>,
    builtins: [DeclId; 5],
}

impl ProgramBuilder {
    pub fn new() -> Self {
        let mut builder = ProgramBuilder {
            decls: Vec::new(),
            exprs: Vec::new(),
            top_level: Vec::new(),
            builtins: [DeclId(0); 5],
        };
        for (slot, (name, builtin)) in [
            ("int", BuiltinType::Int),
            ("float", BuiltinType::Float),
            ("string", BuiltinType::Str),
            ("unit", BuiltinType::Unit),
            ("array", BuiltinType::Array),
        ]
        .into_iter()
        .enumerate()
        {
            let id = builder.push_decl(name, DeclKind::BuiltinType(builtin));
            builder.builtins[slot] = id;
        }
        builder
    }

    pub fn builtin(&self, builtin: BuiltinType) -> DeclId {
        let slot = match builtin {
            BuiltinType::Int => 0,
            BuiltinType::Float => 1,
            BuiltinType::Str => 2,
            BuiltinType::Unit => 3,
            BuiltinType::Array => 4,
        };
        self.builtins[slot]
    }

    fn push_decl(&mut self, name: &str, kind: DeclKind) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Decl {
            name: name.to_string(),
            kind,
            references: Vec::new(),
            span: Span::default(),
        });
        id
    }

    fn push_expr(&mut self, kind: ExprKind) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr {
            kind,
            span: Span::default(),
        });
        id
    }

    /// Forward-declare a top-level name so mutually recursive definitions can
    /// reference it before `define` runs.
    pub fn declare(&mut self, name: &str) -> DeclId {
        let id = self.push_decl(name, DeclKind::Param);
        self.top_level.push(id);
        id
    }

    pub fn define(&mut self, decl: DeclId, value: ExprId) {
        let references = self.collect_references(value);
        let entry = &mut self.decls[decl.0 as usize];
        entry.kind = DeclKind::Value(value);
        entry.references = references;
    }

    pub fn decl(&mut self, name: &str, value: ExprId) -> DeclId {
        let id = self.declare(name);
        self.define(id, value);
        id
    }

    /// A function formal parameter or a match-case binding.
    pub fn param(&mut self, name: &str) -> DeclId {
        self.push_decl(name, DeclKind::Param)
    }

    /// A `name := value` binding local to a sequence block.
    pub fn local(&mut self, name: &str, value: ExprId) -> DeclId {
        self.push_decl(name, DeclKind::Value(value))
    }

    /// Manufacture a reference edge that symbol resolution would normally
    /// produce; useful for driving the dependency scheduler directly.
    pub fn add_reference(&mut self, from: DeclId, to: DeclId) {
        let entry = &mut self.decls[from.0 as usize];
        if !entry.references.contains(&to) {
            entry.references.push(to);
        }
    }

    pub fn unit(&mut self) -> ExprId {
        self.push_expr(ExprKind::Unit)
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.push_expr(ExprKind::Int(value))
    }

    pub fn float(&mut self, value: f64) -> ExprId {
        self.push_expr(ExprKind::Float(value))
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        self.push_expr(ExprKind::Str(value.to_string()))
    }

    pub fn array(&mut self, items: Vec<ExprId>) -> ExprId {
        self.push_expr(ExprKind::Array(items))
    }

    pub fn function(&mut self, params: Vec<DeclId>, body: ExprId) -> ExprId {
        self.push_expr(ExprKind::Function { params, body })
    }

    pub fn call(&mut self, callee: ExprId, args: Vec<ExprId>) -> ExprId {
        self.push_expr(ExprKind::Call { callee, args })
    }

    pub fn index(&mut self, base: ExprId, index: ExprId) -> ExprId {
        self.push_expr(ExprKind::Index { base, index })
    }

    pub fn access(&mut self, base: ExprId, field: &str) -> ExprId {
        self.push_expr(ExprKind::Access {
            base,
            field: field.to_string(),
        })
    }

    pub fn match_expr(&mut self, scrutinee: ExprId, cases: Vec<MatchCase>) -> ExprId {
        self.push_expr(ExprKind::Match { scrutinee, cases })
    }

    pub fn ternary(&mut self, cond: ExprId, then_branch: ExprId, else_branch: ExprId) -> ExprId {
        self.push_expr(ExprKind::Ternary {
            cond,
            then_branch,
            else_branch,
        })
    }

    pub fn record(&mut self, fields: Vec<(&str, ExprId)>) -> ExprId {
        let fields = fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.push_expr(ExprKind::Record { fields })
    }

    pub fn seq(&mut self, items: Vec<SeqItem>) -> ExprId {
        self.push_expr(ExprKind::Seq { items })
    }

    pub fn struct_type(&mut self, fields: Vec<(&str, ExprId)>) -> ExprId {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect();
        self.push_expr(ExprKind::StructType { fields })
    }

    pub fn union_type(&mut self, variants: Vec<(&str, ExprId)>) -> ExprId {
        let variants = variants
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty))
            .collect();
        self.push_expr(ExprKind::UnionType { variants })
    }

    pub fn type_apply(&mut self, base: ExprId, args: Vec<ExprId>) -> ExprId {
        self.push_expr(ExprKind::TypeApply { base, args })
    }

    pub fn ident(&mut self, decl: DeclId) -> ExprId {
        self.push_expr(ExprKind::Ident(decl))
    }

    pub fn finish(self) -> Program {
        Program {
            decls: self.decls,
            exprs: self.exprs,
            top_level: self.top_level,
        }
    }

    fn collect_references(&self, root: ExprId) -> Vec<DeclId> {
        let mut out = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(expr) = stack.pop() {
            match &self.exprs[expr.0 as usize].kind {
                ExprKind::Ident(decl) => {
                    if self.top_level.contains(decl) {
                        out.insert(*decl);
                    }
                }
                ExprKind::Array(items) => stack.extend(items.iter().copied()),
                ExprKind::Function { body, .. } => stack.push(*body),
                ExprKind::Call { callee, args } => {
                    stack.push(*callee);
                    stack.extend(args.iter().copied());
                }
                ExprKind::Index { base, index } => {
                    stack.push(*base);
                    stack.push(*index);
                }
                ExprKind::Access { base, .. } => stack.push(*base),
                ExprKind::Match { scrutinee, cases } => {
                    stack.push(*scrutinee);
                    stack.extend(cases.iter().map(|case| case.body));
                }
                ExprKind::Ternary {
                    cond,
                    then_branch,
                    else_branch,
                } => {
                    stack.push(*cond);
                    stack.push(*then_branch);
                    stack.push(*else_branch);
                }
                ExprKind::Record { fields } => {
                    stack.extend(fields.iter().map(|(_, value)| *value));
                }
                ExprKind::Seq { items } => {
                    for item in items {
                        match item {
                            SeqItem::Expr(expr) => stack.push(*expr),
                            SeqItem::Bind(decl) => {
                                if let DeclKind::Value(value) = self.decls[decl.0 as usize].kind {
                                    stack.push(value);
                                }
                            }
                        }
                    }
                }
                ExprKind::StructType { fields } => {
                    stack.extend(fields.iter().map(|(_, ty)| *ty));
                }
                ExprKind::UnionType { variants } => {
                    stack.extend(variants.iter().map(|(_, ty)| *ty));
                }
                ExprKind::TypeApply { base, args } => {
                    stack.push(*base);
                    stack.extend(args.iter().copied());
                }
                ExprKind::Unit
                | ExprKind::Int(_)
                | ExprKind::Float(_)
                | ExprKind::Str(_) => {}
            }
        }
        out.into_iter().collect()
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}
