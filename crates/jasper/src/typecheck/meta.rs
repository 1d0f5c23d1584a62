use std::collections::HashMap;

use crate::ast::{BuiltinType, DeclId, DeclKind, ExprId, ExprKind, Program, SeqItem};
use crate::diagnostics::Span;

use super::scc::strongly_connected;
use super::TypeError;

/// What a declaration or expression denotes: a runtime value, a monomorphic
/// type, a type-level function (struct/union definition), or a record/variant
/// constructor reached through a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MetaType {
    Term,
    Type,
    TypeFunction,
    Constructor,
    Undefined,
}

pub(crate) struct MetaOutput {
    pub decl_meta: Vec<MetaType>,
    pub expr_meta: Vec<MetaType>,
    /// Full-graph SCCs of the top-level declarations, dependencies first.
    pub order: Vec<Vec<DeclId>>,
}

/// Classify every declaration and expression before the unifier runs.
/// Shallow classification first, then the Undefined remainder in SCC order,
/// then every body, then the full-graph cycle checks.
pub(crate) fn classify(program: &Program) -> Result<MetaOutput, TypeError> {
    let mut classifier = Classifier {
        program,
        decl_meta: vec![MetaType::Undefined; program.decls.len()],
        expr_meta: vec![MetaType::Undefined; program.exprs.len()],
    };
    classifier.classify_shallow();
    let order = classifier.resolve_undefined()?;
    classifier.classify_bodies()?;
    classifier.check_components(&order)?;
    Ok(MetaOutput {
        decl_meta: classifier.decl_meta,
        expr_meta: classifier.expr_meta,
        order,
    })
}

struct Classifier<'a> {
    program: &'a Program,
    decl_meta: Vec<MetaType>,
    expr_meta: Vec<MetaType>,
}

enum Walk {
    Enter(ExprId),
    Exit(ExprId),
    BindLocal { decl: DeclId, value: ExprId },
}

impl<'a> Classifier<'a> {
    fn set_decl(&mut self, decl: DeclId, meta: MetaType) {
        self.decl_meta[decl.0 as usize] = meta;
    }

    fn decl_meta(&self, decl: DeclId) -> MetaType {
        self.decl_meta[decl.0 as usize]
    }

    fn expr_meta(&self, expr: ExprId) -> MetaType {
        self.expr_meta[expr.0 as usize]
    }

    fn classify_shallow(&mut self) {
        for (index, decl) in self.program.decls.iter().enumerate() {
            let meta = match &decl.kind {
                DeclKind::Param => MetaType::Term,
                DeclKind::BuiltinType(builtin) => match builtin {
                    BuiltinType::Array => MetaType::TypeFunction,
                    _ => MetaType::Type,
                },
                DeclKind::Value(value) => shallow_meta(&self.program.expr(*value).kind),
            };
            self.decl_meta[index] = meta;
        }
    }

    /// Top-shape classification of a right-hand side whose shallow pass came
    /// back Undefined: follow identifier/access chains only.
    fn rhs_meta(&self, root: ExprId) -> Result<MetaType, TypeError> {
        let mut accesses = 0usize;
        let mut cursor = root;
        let meta = loop {
            let expr = self.program.expr(cursor);
            match &expr.kind {
                ExprKind::Access { base, .. } => {
                    accesses += 1;
                    cursor = *base;
                }
                ExprKind::Ident(decl) => break self.decl_meta(*decl),
                kind => break shallow_meta(kind),
            }
        };
        let span = &self.program.expr(cursor).span;
        let mut meta = meta;
        for _ in 0..accesses {
            meta = apply_access(meta, span)?;
        }
        Ok(meta)
    }

    /// Spec 4.5 step (c): resolve the declarations whose metatype needed
    /// their dependencies, in SCC order over Undefined-only edges.
    fn resolve_undefined(&mut self) -> Result<Vec<Vec<DeclId>>, TypeError> {
        let top = &self.program.top_level;
        let index_of: HashMap<DeclId, usize> = top
            .iter()
            .enumerate()
            .map(|(index, &decl)| (decl, index))
            .collect();

        let undefined_edges: Vec<Vec<usize>> = top
            .iter()
            .map(|&decl| {
                if self.decl_meta(decl) != MetaType::Undefined {
                    return Vec::new();
                }
                self.program
                    .decl(decl)
                    .references
                    .iter()
                    .filter(|target| self.decl_meta(**target) == MetaType::Undefined)
                    .filter_map(|target| index_of.get(target).copied())
                    .collect()
            })
            .collect();

        for component in strongly_connected(&undefined_edges) {
            let members: Vec<DeclId> = component
                .iter()
                .map(|&index| top[index])
                .filter(|&decl| self.decl_meta(decl) == MetaType::Undefined)
                .collect();
            if members.is_empty() {
                continue;
            }
            let self_loop =
                members.len() == 1 && self.program.decl(members[0]).references.contains(&members[0]);
            if members.len() > 1 || self_loop {
                return Err(TypeError::MetaCycle {
                    names: decl_names(self.program, &members),
                    span: self.program.decl(members[0]).span.clone(),
                });
            }
            let decl = members[0];
            if let Some(value) = self.program.decl_value(decl) {
                let meta = self.rhs_meta(value)?;
                if meta == MetaType::Undefined {
                    return Err(TypeError::MetaConflict {
                        message: format!(
                            "cannot classify `{}`",
                            self.program.decl(decl).name
                        ),
                        span: self.program.decl(decl).span.clone(),
                    });
                }
                self.set_decl(decl, meta);
            }
        }

        // Full-graph components, dependencies first, for the checker.
        let full_edges: Vec<Vec<usize>> = top
            .iter()
            .map(|&decl| {
                self.program
                    .decl(decl)
                    .references
                    .iter()
                    .filter_map(|target| index_of.get(target).copied())
                    .collect()
            })
            .collect();
        let order = strongly_connected(&full_edges)
            .into_iter()
            .map(|component| component.into_iter().map(|index| top[index]).collect())
            .collect();
        Ok(order)
    }

    fn classify_bodies(&mut self) -> Result<(), TypeError> {
        for &decl in &self.program.top_level {
            if let Some(value) = self.program.decl_value(decl) {
                self.classify_body(value)?;
            }
        }
        Ok(())
    }

    /// Explicit work-list walk of one expression tree, post-order so each
    /// node sees its children classified.
    fn classify_body(&mut self, root: ExprId) -> Result<(), TypeError> {
        let mut work = vec![Walk::Enter(root)];
        while let Some(item) = work.pop() {
            match item {
                Walk::Enter(expr) => {
                    work.push(Walk::Exit(expr));
                    self.push_children(expr, &mut work);
                }
                Walk::BindLocal { decl, value } => {
                    let meta = self.expr_meta(value);
                    if meta != MetaType::Term {
                        return Err(TypeError::MetaConflict {
                            message: format!(
                                "block binding `{}` must be a value",
                                self.program.decl(decl).name
                            ),
                            span: self.program.expr(value).span.clone(),
                        });
                    }
                    self.set_decl(decl, MetaType::Term);
                }
                Walk::Exit(expr) => {
                    let meta = self.exit_meta(expr)?;
                    self.expr_meta[expr.0 as usize] = meta;
                }
            }
        }
        Ok(())
    }

    fn push_children(&self, expr: ExprId, work: &mut Vec<Walk>) {
        match &self.program.expr(expr).kind {
            ExprKind::Array(items) => {
                for &item in items.iter().rev() {
                    work.push(Walk::Enter(item));
                }
            }
            ExprKind::Function { body, .. } => work.push(Walk::Enter(*body)),
            ExprKind::Call { callee, args } => {
                for &arg in args.iter().rev() {
                    work.push(Walk::Enter(arg));
                }
                work.push(Walk::Enter(*callee));
            }
            ExprKind::Index { base, index } => {
                work.push(Walk::Enter(*index));
                work.push(Walk::Enter(*base));
            }
            ExprKind::Access { base, .. } => work.push(Walk::Enter(*base)),
            ExprKind::Match { scrutinee, cases } => {
                for case in cases.iter().rev() {
                    work.push(Walk::Enter(case.body));
                }
                work.push(Walk::Enter(*scrutinee));
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                work.push(Walk::Enter(*else_branch));
                work.push(Walk::Enter(*then_branch));
                work.push(Walk::Enter(*cond));
            }
            ExprKind::Record { fields } => {
                for (_, value) in fields.iter().rev() {
                    work.push(Walk::Enter(*value));
                }
            }
            ExprKind::Seq { items } => {
                for item in items.iter().rev() {
                    match item {
                        SeqItem::Expr(expr) => work.push(Walk::Enter(*expr)),
                        SeqItem::Bind(decl) => {
                            if let Some(value) = self.program.decl_value(*decl) {
                                work.push(Walk::BindLocal { decl: *decl, value });
                                work.push(Walk::Enter(value));
                            }
                        }
                    }
                }
            }
            ExprKind::StructType { fields } => {
                for (_, ty) in fields.iter().rev() {
                    work.push(Walk::Enter(*ty));
                }
            }
            ExprKind::UnionType { variants } => {
                for (_, ty) in variants.iter().rev() {
                    work.push(Walk::Enter(*ty));
                }
            }
            ExprKind::TypeApply { base, args } => {
                for &arg in args.iter().rev() {
                    work.push(Walk::Enter(arg));
                }
                work.push(Walk::Enter(*base));
            }
            ExprKind::Unit
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Ident(_) => {}
        }
    }

    fn exit_meta(&self, expr: ExprId) -> Result<MetaType, TypeError> {
        let span = &self.program.expr(expr).span;
        match &self.program.expr(expr).kind {
            ExprKind::Unit | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {
                Ok(MetaType::Term)
            }
            ExprKind::Array(items) => {
                for &item in items {
                    self.expect_term(item)?;
                }
                Ok(MetaType::Term)
            }
            ExprKind::Function { body, .. } => {
                self.expect_term(*body)?;
                Ok(MetaType::Term)
            }
            ExprKind::Call { callee, args } => {
                let callee_meta = self.expr_meta(*callee);
                if callee_meta != MetaType::Term && callee_meta != MetaType::Constructor {
                    return Err(TypeError::MetaConflict {
                        message: "call target is not a value or constructor".to_string(),
                        span: span.clone(),
                    });
                }
                for &arg in args {
                    self.expect_term(arg)?;
                }
                Ok(MetaType::Term)
            }
            ExprKind::Index { base, index } => {
                self.expect_term(*base)?;
                self.expect_term(*index)?;
                Ok(MetaType::Term)
            }
            ExprKind::Access { base, .. } => apply_access(self.expr_meta(*base), span),
            ExprKind::Match { scrutinee, cases } => {
                self.expect_term(*scrutinee)?;
                for case in cases {
                    self.expect_term(case.body)?;
                }
                Ok(MetaType::Term)
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect_term(*cond)?;
                self.expect_term(*then_branch)?;
                self.expect_term(*else_branch)?;
                Ok(MetaType::Term)
            }
            ExprKind::Record { fields } => {
                for (_, value) in fields {
                    self.expect_term(*value)?;
                }
                Ok(MetaType::Term)
            }
            ExprKind::Seq { items } => {
                for item in items {
                    if let SeqItem::Expr(expr) = item {
                        self.expect_term(*expr)?;
                    }
                }
                Ok(MetaType::Term)
            }
            ExprKind::StructType { fields } => {
                for (_, ty) in fields {
                    self.expect_type(*ty)?;
                }
                Ok(MetaType::TypeFunction)
            }
            ExprKind::UnionType { variants } => {
                for (_, ty) in variants {
                    self.expect_type(*ty)?;
                }
                Ok(MetaType::TypeFunction)
            }
            ExprKind::TypeApply { base, args } => {
                if self.expr_meta(*base) != MetaType::TypeFunction {
                    return Err(TypeError::MetaConflict {
                        message: "type application base is not a type function".to_string(),
                        span: span.clone(),
                    });
                }
                for &arg in args {
                    self.expect_type(arg)?;
                }
                Ok(MetaType::Type)
            }
            ExprKind::Ident(decl) => {
                let meta = self.decl_meta(*decl);
                if meta == MetaType::Undefined {
                    return Err(TypeError::MetaConflict {
                        message: format!(
                            "`{}` is used before it can be classified",
                            self.program.decl(*decl).name
                        ),
                        span: span.clone(),
                    });
                }
                Ok(meta)
            }
        }
    }

    fn expect_term(&self, expr: ExprId) -> Result<(), TypeError> {
        if self.expr_meta(expr) != MetaType::Term {
            return Err(TypeError::MetaConflict {
                message: "expected a value expression".to_string(),
                span: self.program.expr(expr).span.clone(),
            });
        }
        Ok(())
    }

    fn expect_type(&self, expr: ExprId) -> Result<(), TypeError> {
        let meta = self.expr_meta(expr);
        if meta != MetaType::Type && meta != MetaType::TypeFunction {
            return Err(TypeError::MetaConflict {
                message: "expected a type expression".to_string(),
                span: self.program.expr(expr).span.clone(),
            });
        }
        Ok(())
    }

    /// Spec 4.5 step (e): cycles may not mix the type and value domains,
    /// and constructors cannot be stored in variables.
    fn check_components(&self, order: &[Vec<DeclId>]) -> Result<(), TypeError> {
        for component in order {
            let mut has_term = false;
            let mut has_type = false;
            for &decl in component {
                match self.decl_meta(decl) {
                    MetaType::Term => has_term = true,
                    MetaType::Type | MetaType::TypeFunction => has_type = true,
                    MetaType::Constructor => {
                        return Err(TypeError::ConstructorBinding {
                            name: self.program.decl(decl).name.clone(),
                            span: self.program.decl(decl).span.clone(),
                        });
                    }
                    MetaType::Undefined => {}
                }
            }
            if has_term && has_type && component.len() > 1 {
                return Err(TypeError::MixedCycle {
                    names: decl_names(self.program, component),
                    span: self.program.decl(component[0]).span.clone(),
                });
            }
        }
        Ok(())
    }
}

fn shallow_meta(kind: &ExprKind) -> MetaType {
    match kind {
        ExprKind::StructType { .. } | ExprKind::UnionType { .. } => MetaType::TypeFunction,
        ExprKind::TypeApply { .. } => MetaType::Type,
        ExprKind::Ident(_) | ExprKind::Access { .. } => MetaType::Undefined,
        _ => MetaType::Term,
    }
}

fn apply_access(base: MetaType, span: &Span) -> Result<MetaType, TypeError> {
    match base {
        MetaType::Term => Ok(MetaType::Term),
        MetaType::Type | MetaType::TypeFunction => Ok(MetaType::Constructor),
        _ => Err(TypeError::MetaConflict {
            message: "field access on a non-value, non-type expression".to_string(),
            span: span.clone(),
        }),
    }
}

fn decl_names(program: &Program, decls: &[DeclId]) -> String {
    decls
        .iter()
        .map(|&decl| program.decl(decl).name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
