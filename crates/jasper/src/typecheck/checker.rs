use std::collections::{BTreeMap, HashMap};

use crate::ast::{BuiltinType, DeclId, DeclKind, ExprId, ExprKind, Program, SeqItem};
use crate::diagnostics::Span;

use super::funcs::{FuncId, FuncRegistry, FuncTag, Strength};
use super::meta::{MetaOutput, MetaType};
use super::poly::{self, Poly, PolyId, PolyTable, ScopeStack};
use super::store::{MonoId, SubstStore};
use super::TypeError;

/// A resolved variant constructor reached through a type, e.g. `Color.Red`.
#[derive(Debug, Clone)]
pub struct Constructor {
    /// The variant type the constructor produces.
    pub mono: MonoId,
    pub func: FuncId,
    pub variant: String,
    pub payload: MonoId,
}

pub(crate) struct Checker<'a> {
    program: &'a Program,
    store: SubstStore,
    funcs: FuncRegistry,
    polys: PolyTable,
    scopes: ScopeStack,
    decl_meta: Vec<MetaType>,
    expr_meta: Vec<MetaType>,
    expr_type: Vec<Option<MonoId>>,
    decl_mono: Vec<Option<MonoId>>,
    decl_poly: Vec<Option<PolyId>>,
    decl_polymorphic: Vec<bool>,
    decl_func: Vec<Option<FuncId>>,
    constructors: HashMap<ExprId, Constructor>,
    mono_int: MonoId,
    mono_float: MonoId,
    mono_string: MonoId,
    mono_unit: MonoId,
}

impl<'a> Checker<'a> {
    pub(crate) fn run(program: &'a Program, meta: MetaOutput) -> Result<TypedProgram, TypeError> {
        let MetaOutput {
            decl_meta,
            expr_meta,
            order,
        } = meta;
        let mut store = SubstStore::new();
        let funcs = FuncRegistry::new();
        let mono_int = store.term(funcs.int, vec![]);
        let mono_float = store.term(funcs.float, vec![]);
        let mono_string = store.term(funcs.string, vec![]);
        let mono_unit = store.term(funcs.unit, vec![]);
        let mut checker = Checker {
            program,
            store,
            funcs,
            polys: PolyTable::new(),
            scopes: ScopeStack::new(),
            decl_meta,
            expr_meta,
            expr_type: vec![None; program.exprs.len()],
            decl_mono: vec![None; program.decls.len()],
            decl_poly: vec![None; program.decls.len()],
            decl_polymorphic: vec![false; program.decls.len()],
            decl_func: vec![None; program.decls.len()],
            constructors: HashMap::new(),
            mono_int,
            mono_float,
            mono_string,
            mono_unit,
        };
        checker.seed_builtins();
        for component in &order {
            checker.check_component(component)?;
        }
        Ok(checker.finish(order))
    }

    fn seed_builtins(&mut self) {
        for (index, decl) in self.program.decls.iter().enumerate() {
            if let DeclKind::BuiltinType(builtin) = decl.kind {
                match builtin {
                    BuiltinType::Int => self.decl_mono[index] = Some(self.mono_int),
                    BuiltinType::Float => self.decl_mono[index] = Some(self.mono_float),
                    BuiltinType::Str => self.decl_mono[index] = Some(self.mono_string),
                    BuiltinType::Unit => self.decl_mono[index] = Some(self.mono_unit),
                    BuiltinType::Array => self.decl_func[index] = Some(self.funcs.array),
                }
            }
        }
    }

    fn finish(self, order: Vec<Vec<DeclId>>) -> TypedProgram {
        TypedProgram {
            store: self.store,
            funcs: self.funcs,
            polys: self.polys,
            decl_meta: self.decl_meta,
            expr_meta: self.expr_meta,
            expr_type: self.expr_type,
            decl_poly: self.decl_poly,
            decl_polymorphic: self.decl_polymorphic,
            constructors: self.constructors,
            order,
        }
    }

    fn meta_of_decl(&self, decl: DeclId) -> MetaType {
        self.decl_meta[decl.0 as usize]
    }

    fn unify(&mut self, a: MonoId, b: MonoId, span: &Span) -> Result<(), TypeError> {
        self.store.unify(&mut self.funcs, a, b, span)
    }

    /// One strongly connected component of the declaration graph. Every
    /// member gets a dummy type before any body is checked, so recursive and
    /// mutually recursive definitions see each other; generalization runs
    /// once the whole component is done.
    fn check_component(&mut self, component: &[DeclId]) -> Result<(), TypeError> {
        for &decl in component {
            match self.meta_of_decl(decl) {
                MetaType::Term | MetaType::Type => {
                    let dummy = self.store.new_var();
                    self.decl_mono[decl.0 as usize] = Some(dummy);
                }
                MetaType::TypeFunction => self.predeclare_type_function(decl),
                _ => {}
            }
        }
        self.resolve_type_function_aliases(component)?;
        for &decl in component {
            self.check_decl(decl)?;
        }
        for &decl in component {
            if self.meta_of_decl(decl) == MetaType::Term {
                self.generalize_decl(decl)?;
            }
        }
        Ok(())
    }

    fn predeclare_type_function(&mut self, decl: DeclId) {
        let Some(value) = self.program.decl_value(decl) else {
            return;
        };
        let name = self.program.decl(decl).name.clone();
        let func = match self.program.expr(value).kind {
            ExprKind::StructType { .. } => {
                Some(self.funcs.new_full(&name, FuncTag::Record, BTreeMap::new()))
            }
            ExprKind::UnionType { .. } => {
                Some(self.funcs.new_full(&name, FuncTag::Variant, BTreeMap::new()))
            }
            _ => None,
        };
        if func.is_some() {
            self.decl_func[decl.0 as usize] = func;
        }
    }

    /// `p := q` aliases between type functions inside one component settle
    /// here; chains are acyclic (a pure alias cycle is a metatype cycle), so
    /// a bounded number of sweeps is enough.
    fn resolve_type_function_aliases(&mut self, component: &[DeclId]) -> Result<(), TypeError> {
        for _ in 0..component.len() {
            let mut progressed = false;
            for &decl in component {
                if self.meta_of_decl(decl) != MetaType::TypeFunction {
                    continue;
                }
                if self.decl_func[decl.0 as usize].is_some() {
                    continue;
                }
                let Some(value) = self.program.decl_value(decl) else {
                    continue;
                };
                if let ExprKind::Ident(target) = self.program.expr(value).kind {
                    if let Some(func) = self.decl_func[target.0 as usize] {
                        self.decl_func[decl.0 as usize] = Some(func);
                        progressed = true;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
        for &decl in component {
            if self.meta_of_decl(decl) == MetaType::TypeFunction
                && self.decl_func[decl.0 as usize].is_none()
            {
                return Err(TypeError::MetaConflict {
                    message: format!(
                        "cannot resolve type function `{}`",
                        self.program.decl(decl).name
                    ),
                    span: self.program.decl(decl).span.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_decl(&mut self, decl: DeclId) -> Result<(), TypeError> {
        let Some(value) = self.program.decl_value(decl) else {
            return Ok(());
        };
        let span = self.program.decl(decl).span.clone();
        match self.meta_of_decl(decl) {
            MetaType::Term => {
                let inferred = self.infer_expr(value)?;
                let dummy = self.decl_mono[decl.0 as usize].unwrap_or(inferred);
                self.unify(inferred, dummy, &span)
            }
            MetaType::Type => {
                let ty = self.eval_type(value)?;
                let dummy = self.decl_mono[decl.0 as usize].unwrap_or(ty);
                self.unify(dummy, ty, &span)
            }
            MetaType::TypeFunction => self.fill_type_function(decl, value),
            _ => Ok(()),
        }
    }

    fn fill_type_function(&mut self, decl: DeclId, value: ExprId) -> Result<(), TypeError> {
        let fields = match &self.program.expr(value).kind {
            ExprKind::StructType { fields } => fields.clone(),
            ExprKind::UnionType { variants } => variants.clone(),
            // An alias; the target fills its own structure.
            _ => return Ok(()),
        };
        let mut structure = BTreeMap::new();
        for (name, ty) in fields {
            structure.insert(name, self.eval_type(ty)?);
        }
        if let Some(func) = self.decl_func[decl.0 as usize] {
            self.funcs.set_structure(func, structure);
        }
        Ok(())
    }

    /// The value restriction: only function literals and identifiers are
    /// generalized; anything else keeps its free variables in the enclosing
    /// scope so every later use is constrained consistently.
    fn generalize_decl(&mut self, decl: DeclId) -> Result<(), TypeError> {
        let Some(value) = self.program.decl_value(decl) else {
            return Ok(());
        };
        let Some(base) = self.decl_mono[decl.0 as usize] else {
            return Ok(());
        };
        let eligible = matches!(
            self.program.expr(value).kind,
            ExprKind::Function { .. } | ExprKind::Ident(_)
        );
        self.finish_binding(decl, base, eligible);
        Ok(())
    }

    fn finish_binding(&mut self, decl: DeclId, base: MonoId, eligible: bool) {
        if eligible {
            let poly = poly::generalize(&mut self.store, &self.funcs, &self.scopes, base);
            self.decl_polymorphic[decl.0 as usize] = !poly.vars.is_empty();
            self.decl_poly[decl.0 as usize] = Some(self.polys.push(poly));
        } else {
            for var in poly::gather_free_vars(&mut self.store, &self.funcs, base) {
                self.scopes.bind(var);
            }
            self.decl_poly[decl.0 as usize] = Some(self.polys.push(Poly {
                base,
                vars: Vec::new(),
            }));
        }
    }

    fn infer_expr(&mut self, expr: ExprId) -> Result<MonoId, TypeError> {
        let ty = self.infer_expr_kind(expr)?;
        self.expr_type[expr.0 as usize] = Some(ty);
        Ok(ty)
    }

    fn infer_expr_kind(&mut self, expr: ExprId) -> Result<MonoId, TypeError> {
        let span = self.program.expr(expr).span.clone();
        match self.program.expr(expr).kind.clone() {
            ExprKind::Unit => Ok(self.mono_unit),
            ExprKind::Int(_) => Ok(self.mono_int),
            ExprKind::Float(_) => Ok(self.mono_float),
            ExprKind::Str(_) => Ok(self.mono_string),
            ExprKind::Array(items) => {
                let elem = self.store.new_var();
                for item in items {
                    let ty = self.infer_expr(item)?;
                    self.unify(ty, elem, &span)?;
                }
                Ok(self.store.term(self.funcs.array, vec![elem]))
            }
            ExprKind::Function { params, body } => {
                self.scopes.push();
                let mut args = Vec::with_capacity(params.len() + 1);
                for param in params {
                    let var = self.store.new_var();
                    self.decl_mono[param.0 as usize] = Some(var);
                    self.scopes.bind(var);
                    args.push(var);
                }
                let result = self.infer_expr(body);
                self.scopes.pop();
                args.push(result?);
                Ok(self.store.term(self.funcs.function, args))
            }
            ExprKind::Call { callee, args } => {
                if self.expr_meta[callee.0 as usize] == MetaType::Constructor {
                    return self.infer_constructor_call(callee, &args, &span);
                }
                let callee_ty = self.infer_expr(callee)?;
                let mut expected = Vec::with_capacity(args.len() + 1);
                for arg in args {
                    expected.push(self.infer_expr(arg)?);
                }
                let ret = self.store.new_var();
                expected.push(ret);
                let func_ty = self.store.term(self.funcs.function, expected);
                self.unify(callee_ty, func_ty, &span)?;
                Ok(ret)
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.infer_expr(base)?;
                let index_ty = self.infer_expr(index)?;
                self.unify(index_ty, self.mono_int, &span)?;
                let elem = self.store.new_var();
                let array_ty = self.store.term(self.funcs.array, vec![elem]);
                self.unify(base_ty, array_ty, &span)?;
                Ok(elem)
            }
            ExprKind::Access { base, field } => {
                if self.expr_meta[expr.0 as usize] == MetaType::Constructor {
                    return Err(TypeError::MetaConflict {
                        message: format!("constructor `{field}` must be applied"),
                        span,
                    });
                }
                let base_ty = self.infer_expr(base)?;
                self.store
                    .record_field(&mut self.funcs, base_ty, &field, &span)
            }
            ExprKind::Match { scrutinee, cases } => {
                let scrutinee_ty = self.infer_expr(scrutinee)?;
                let result = self.store.new_var();
                for case in cases {
                    let payload =
                        self.store
                            .variant_case(&mut self.funcs, scrutinee_ty, &case.variant, &span)?;
                    if let Some(binding) = case.binding {
                        self.decl_mono[binding.0 as usize] = Some(payload);
                    }
                    let body_ty = self.infer_expr(case.body)?;
                    self.unify(body_ty, result, &span)?;
                }
                Ok(result)
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond_ty = self.infer_expr(cond)?;
                self.unify(cond_ty, self.mono_int, &span)?;
                let then_ty = self.infer_expr(then_branch)?;
                let else_ty = self.infer_expr(else_branch)?;
                self.unify(then_ty, else_ty, &span)?;
                Ok(then_ty)
            }
            ExprKind::Record { fields } => {
                let mut structure = BTreeMap::new();
                for (name, value) in fields {
                    structure.insert(name, self.infer_expr(value)?);
                }
                let func = self.funcs.new_full("record", FuncTag::Record, structure);
                Ok(self.store.term(func, vec![]))
            }
            ExprKind::Seq { items } => {
                let mut last = self.mono_unit;
                for item in &items {
                    match item {
                        SeqItem::Bind(decl) => {
                            self.check_local(*decl)?;
                            last = self.mono_unit;
                        }
                        SeqItem::Expr(expr) => last = self.infer_expr(*expr)?,
                    }
                }
                Ok(last)
            }
            ExprKind::Ident(decl) => self.infer_ident(decl, &span),
            ExprKind::StructType { .. } | ExprKind::UnionType { .. } | ExprKind::TypeApply { .. } => {
                Err(TypeError::MetaConflict {
                    message: "type expression used as a value".to_string(),
                    span,
                })
            }
        }
    }

    fn infer_ident(&mut self, decl: DeclId, span: &Span) -> Result<MonoId, TypeError> {
        if self.meta_of_decl(decl) != MetaType::Term {
            return Err(TypeError::MetaConflict {
                message: format!("`{}` is not a value", self.program.decl(decl).name),
                span: span.clone(),
            });
        }
        if let Some(poly_id) = self.decl_poly[decl.0 as usize] {
            let poly = self.polys.get(poly_id).clone();
            return Ok(poly::instantiate(&mut self.store, &mut self.funcs, &poly));
        }
        match self.decl_mono[decl.0 as usize] {
            Some(mono) => Ok(mono),
            None => Err(TypeError::MetaConflict {
                message: format!(
                    "`{}` is used before it is checked",
                    self.program.decl(decl).name
                ),
                span: span.clone(),
            }),
        }
    }

    fn check_local(&mut self, decl: DeclId) -> Result<(), TypeError> {
        let Some(value) = self.program.decl_value(decl) else {
            return Ok(());
        };
        let ty = self.infer_expr(value)?;
        self.decl_mono[decl.0 as usize] = Some(ty);
        let eligible = matches!(
            self.program.expr(value).kind,
            ExprKind::Function { .. } | ExprKind::Ident(_)
        );
        self.finish_binding(decl, ty, eligible);
        Ok(())
    }

    fn infer_constructor_call(
        &mut self,
        callee: ExprId,
        args: &[ExprId],
        span: &Span,
    ) -> Result<MonoId, TypeError> {
        let constructor = self.resolve_constructor(callee)?;
        match args {
            [] => {
                let payload_rep = self.store.find(constructor.payload);
                let is_unit = self
                    .store
                    .term_of(payload_rep)
                    .map(|term| self.funcs.resolve(term.func) == self.funcs.resolve(self.funcs.unit))
                    .unwrap_or(false);
                if !is_unit {
                    return Err(TypeError::ArityMismatch {
                        func: constructor.variant,
                        expected: 1,
                        found: 0,
                        span: span.clone(),
                    });
                }
            }
            [arg] => {
                let arg_ty = self.infer_expr(*arg)?;
                self.unify(arg_ty, constructor.payload, span)?;
            }
            more => {
                return Err(TypeError::ArityMismatch {
                    func: constructor.variant,
                    expected: 1,
                    found: more.len(),
                    span: span.clone(),
                });
            }
        }
        Ok(constructor.mono)
    }

    /// Resolve `SomeType.Case` to the variant constructor it names, and
    /// remember it for the interpreter.
    fn resolve_constructor(&mut self, expr: ExprId) -> Result<Constructor, TypeError> {
        if let Some(existing) = self.constructors.get(&expr) {
            return Ok(existing.clone());
        }
        let span = self.program.expr(expr).span.clone();
        let ExprKind::Access { base, field } = self.program.expr(expr).kind.clone() else {
            return Err(TypeError::MetaConflict {
                message: "constructor expression is not a field access".to_string(),
                span,
            });
        };
        let base_ty = self.eval_type(base)?;
        let rep = self.store.find(base_ty);
        let Some(term) = self.store.term_of(rep).cloned() else {
            return Err(TypeError::MetaConflict {
                message: "constructor base is not a concrete type".to_string(),
                span,
            });
        };
        let func = self.funcs.find(term.func);
        if self.funcs.tag_of(func) != FuncTag::Variant {
            return Err(TypeError::MetaConflict {
                message: format!("`{}` has no constructors", self.funcs.name_of(func)),
                span,
            });
        }
        let Some(payload) = self.funcs.field_of(func, &field) else {
            return Err(TypeError::MissingField {
                field,
                on: self.funcs.name_of(func).to_string(),
                span,
            });
        };
        let constructor = Constructor {
            mono: rep,
            func,
            variant: field,
            payload,
        };
        self.constructors.insert(expr, constructor.clone());
        Ok(constructor)
    }

    /// Evaluate an expression in type position to a monotype.
    fn eval_type(&mut self, expr: ExprId) -> Result<MonoId, TypeError> {
        let span = self.program.expr(expr).span.clone();
        match self.program.expr(expr).kind.clone() {
            ExprKind::Ident(decl) => match self.meta_of_decl(decl) {
                MetaType::Type => match self.decl_mono[decl.0 as usize] {
                    Some(mono) => Ok(mono),
                    None => Err(TypeError::MetaConflict {
                        message: format!(
                            "type `{}` is used before it is checked",
                            self.program.decl(decl).name
                        ),
                        span,
                    }),
                },
                MetaType::TypeFunction => {
                    let func = self.type_function_of(decl, &span)?;
                    let arity = self.funcs.arity_of(func);
                    if arity > 0 {
                        return Err(TypeError::ArityMismatch {
                            func: self.funcs.name_of(func).to_string(),
                            expected: arity as usize,
                            found: 0,
                            span,
                        });
                    }
                    Ok(self.store.term(func, vec![]))
                }
                _ => Err(TypeError::MetaConflict {
                    message: format!("`{}` is not a type", self.program.decl(decl).name),
                    span,
                }),
            },
            ExprKind::TypeApply { base, args } => {
                let func = self.eval_type_function(base)?;
                let mut monos = Vec::with_capacity(args.len());
                for arg in args {
                    monos.push(self.eval_type(arg)?);
                }
                self.store.new_term(&self.funcs, func, monos, &span)
            }
            ExprKind::StructType { fields } => {
                let func = self.inline_type_function("record", FuncTag::Record, &fields)?;
                Ok(self.store.term(func, vec![]))
            }
            ExprKind::UnionType { variants } => {
                let func = self.inline_type_function("variant", FuncTag::Variant, &variants)?;
                Ok(self.store.term(func, vec![]))
            }
            _ => Err(TypeError::MetaConflict {
                message: "expected a type expression".to_string(),
                span,
            }),
        }
    }

    fn eval_type_function(&mut self, expr: ExprId) -> Result<FuncId, TypeError> {
        let span = self.program.expr(expr).span.clone();
        match self.program.expr(expr).kind.clone() {
            ExprKind::Ident(decl) if self.meta_of_decl(decl) == MetaType::TypeFunction => {
                self.type_function_of(decl, &span)
            }
            ExprKind::StructType { fields } => {
                self.inline_type_function("record", FuncTag::Record, &fields)
            }
            ExprKind::UnionType { variants } => {
                self.inline_type_function("variant", FuncTag::Variant, &variants)
            }
            _ => Err(TypeError::MetaConflict {
                message: "expected a type function".to_string(),
                span,
            }),
        }
    }

    fn inline_type_function(
        &mut self,
        name: &str,
        tag: FuncTag,
        fields: &[(String, ExprId)],
    ) -> Result<FuncId, TypeError> {
        let mut structure = BTreeMap::new();
        for (field, ty) in fields {
            structure.insert(field.clone(), self.eval_type(*ty)?);
        }
        Ok(self.funcs.new_full(name, tag, structure))
    }

    fn type_function_of(&self, decl: DeclId, span: &Span) -> Result<FuncId, TypeError> {
        self.decl_func[decl.0 as usize]
            .ok_or_else(|| TypeError::MetaConflict {
                message: format!(
                    "type function `{}` is used before it is checked",
                    self.program.decl(decl).name
                ),
                span: span.clone(),
            })
    }
}

/// The checker's output: metatype and type annotations keyed by the same
/// arena ids the input AST uses, plus the declaration processing order.
#[derive(Debug)]
pub struct TypedProgram {
    store: SubstStore,
    funcs: FuncRegistry,
    polys: PolyTable,
    decl_meta: Vec<MetaType>,
    expr_meta: Vec<MetaType>,
    expr_type: Vec<Option<MonoId>>,
    decl_poly: Vec<Option<PolyId>>,
    decl_polymorphic: Vec<bool>,
    constructors: HashMap<ExprId, Constructor>,
    order: Vec<Vec<DeclId>>,
}

impl TypedProgram {
    pub fn meta_type_of_decl(&self, decl: DeclId) -> MetaType {
        self.decl_meta[decl.0 as usize]
    }

    pub fn meta_type_of_expr(&self, expr: ExprId) -> MetaType {
        self.expr_meta[expr.0 as usize]
    }

    pub fn value_type(&self, expr: ExprId) -> Option<MonoId> {
        self.expr_type[expr.0 as usize]
    }

    pub fn decl_type(&self, decl: DeclId) -> Option<PolyId> {
        self.decl_poly[decl.0 as usize]
    }

    pub fn is_polymorphic(&self, decl: DeclId) -> bool {
        self.decl_polymorphic[decl.0 as usize]
    }

    pub fn constructor(&self, expr: ExprId) -> Option<&Constructor> {
        self.constructors.get(&expr)
    }

    /// SCCs of the top-level declarations in safe processing order; the
    /// interpreter reuses this for global initialization.
    pub fn declaration_order(&self) -> &[Vec<DeclId>] {
        &self.order
    }

    pub fn display(&self, mono: MonoId) -> String {
        let mut names = HashMap::new();
        let mut out = String::new();
        self.fmt_mono(mono, &mut names, &mut out, 0);
        out
    }

    pub fn display_decl(&self, decl: DeclId) -> Option<String> {
        let poly_id = self.decl_poly[decl.0 as usize]?;
        Some(self.display(self.polys.get(poly_id).base))
    }

    fn fmt_mono(
        &self,
        mono: MonoId,
        names: &mut HashMap<MonoId, String>,
        out: &mut String,
        depth: usize,
    ) {
        if depth > 64 {
            out.push_str("...");
            return;
        }
        let rep = self.store.resolve(mono);
        let Some(term) = self.store.term_of(rep) else {
            let next = names.len();
            let name = names.entry(rep).or_insert_with(|| var_name(next));
            out.push_str(name);
            return;
        };
        let func = self.funcs.resolve(term.func);
        if func == self.funcs.resolve(self.funcs.function) {
            out.push_str("fn(");
            if let Some((ret, params)) = term.args.split_last() {
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    self.fmt_mono(*param, names, out, depth + 1);
                }
                out.push_str(") -> ");
                self.fmt_mono(*ret, names, out, depth + 1);
            } else {
                out.push(')');
            }
            return;
        }
        if func == self.funcs.resolve(self.funcs.array) {
            out.push_str("array(");
            if let Some(elem) = term.args.first() {
                self.fmt_mono(*elem, names, out, depth + 1);
            }
            out.push(')');
            return;
        }
        match self.funcs.tag_of(func) {
            FuncTag::Builtin => out.push_str(self.funcs.name_of(func)),
            FuncTag::Record | FuncTag::Variant => {
                let name = self.funcs.name_of(func);
                let anonymous = name == "record" || name == "variant";
                if self.funcs.strength_of(func) == Strength::Full && !anonymous {
                    out.push_str(name);
                    return;
                }
                if self.funcs.tag_of(func) == FuncTag::Variant {
                    out.push_str("union ");
                }
                out.push('{');
                let structure = self.funcs.structure_of(func);
                for (index, (field, ty)) in structure.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(field);
                    out.push_str(": ");
                    self.fmt_mono(*ty, names, out, depth + 1);
                }
                if self.funcs.strength_of(func) != Strength::Full {
                    if !structure.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("..");
                }
                out.push('}');
            }
        }
    }

    /// The representative of `mono` in the substitution store.
    pub fn resolve(&self, mono: MonoId) -> MonoId {
        self.store.resolve(mono)
    }

    /// A fresh instantiation of a generalized declaration type, for
    /// consumers that keep unifying after checking (interpreter call sites,
    /// REPL-style queries).
    pub fn instantiate(&mut self, poly: PolyId) -> MonoId {
        let poly = self.polys.get(poly).clone();
        poly::instantiate(&mut self.store, &mut self.funcs, &poly)
    }

    /// Instantiate substituting the supplied types for the quantified
    /// variables, in quantification order.
    pub fn instantiate_with(
        &mut self,
        poly: PolyId,
        vals: &[MonoId],
        span: &Span,
    ) -> Result<MonoId, TypeError> {
        let poly = self.polys.get(poly).clone();
        poly::instantiate_with(&mut self.store, &mut self.funcs, &poly, vals, span)
    }
}

fn var_name(index: usize) -> String {
    if index < 26 {
        let letter = (b'a' + index as u8) as char;
        format!("'{letter}")
    } else {
        format!("'t{index}")
    }
}
