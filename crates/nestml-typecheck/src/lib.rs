//! # nestml-typecheck
//!
//! C5: bottom-up, unit-aware type decoration.
//!
//! Every declaration gets a [`Type`] from its written [`PhysicalType`];
//! every expression is re-derived from its operands using the unit algebra
//! in `nestml-units`. A mismatch is reported once, at the offending node,
//! and the node's type becomes `None` (the "error" sentinel) so the same
//! mismatch is not re-reported by every ancestor expression that contains
//! it — this is the "cascade suppression" spec.md asks for.
//!
//! This crate does not mutate the AST (unlike the symbol table builder,
//! which nothing here assumes): it returns a side table of resolved types
//! keyed by declaration name, plus function signatures, for C6/C7/C8 to
//! consult without re-deriving them.

use indexmap::IndexMap;

use nestml_core::{Diagnostic, SourceRange};
use nestml_parser::{
    BinaryOp, Block, CompilationUnit, Declaration, EquationsEntry, Expr, ForStatement, FunctionDecl, IfStatement,
    InputPort, Model, PhysicalType, Statement, UnaryOp,
};
use nestml_symbols::{ModelSymbolTable, SymbolKind, SymbolTable};
use nestml_units::{parse_unit_expr, Rational, Type, UnitVector};

/// A user or built-in function's signature. Built-ins with a
/// dependent-unit return (`random_normal`, `min`, `max`, `abs`) are modeled
/// with an empty `parameters` list and handled specially in
/// [`Checker::check_call`] rather than forced into this shape.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub parameters: Vec<(String, Type)>,
    pub return_type: Type,
}

/// Per-model decoration: every declared name's resolved [`Type`] (state,
/// parameters, internals, initial_values, input ports) plus user function
/// signatures. Shapes are intentionally excluded — C7 assigns them a type
/// derived from their equation, once the equation is canonicalized.
#[derive(Debug, Clone, Default)]
pub struct ModelTypes {
    pub variables: IndexMap<String, Type>,
    pub functions: IndexMap<String, FunctionSignature>,
}

impl ModelTypes {
    pub fn type_of(&self, name: &str) -> Option<Type> {
        self.variables.get(name).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeCheckResult {
    pub models: IndexMap<String, ModelTypes>,
}

pub fn check_types(unit: &CompilationUnit, symbols: &SymbolTable) -> (TypeCheckResult, Vec<Diagnostic>) {
    let mut result = TypeCheckResult::default();
    let mut diagnostics = Vec::new();

    for model in &unit.models {
        let name = model.name().to_string();
        let Some(scope) = symbols.models.get(&name) else {
            // C4 already reported a duplicate-name error and skipped this
            // model's scope; nothing to type-check.
            continue;
        };
        let (types, mut model_diags) = check_model(model, scope);
        diagnostics.append(&mut model_diags);
        result.models.insert(name, types);
    }

    (result, diagnostics)
}

fn physical_type_to_type(ty: &PhysicalType) -> Result<Type, String> {
    match ty {
        PhysicalType::Integer => Ok(Type::integer()),
        PhysicalType::Real => Ok(Type::dimensionless_real()),
        PhysicalType::Boolean => Ok(Type::boolean()),
        PhysicalType::String => Ok(Type::string()),
        PhysicalType::Void => Ok(Type::void()),
        PhysicalType::Unit(text) => parse_unit_expr(text).map(Type::real).map_err(|e| e.to_string()),
    }
}

fn check_model(model: &Model, symbol_scope: &ModelSymbolTable) -> (ModelTypes, Vec<Diagnostic>) {
    let blocks: &[Block] = match model {
        Model::Neuron(n) => &n.blocks,
        Model::Synapse(s) => &s.blocks,
    };

    let mut checker = Checker {
        symbol_scope,
        variables: IndexMap::new(),
        functions: builtin_signatures(),
        diagnostics: Vec::new(),
    };

    // Declarations first (so forward references inside the same block, and
    // references across blocks, all resolve regardless of source order —
    // the symbol table has already validated uniqueness).
    for block in blocks {
        match block {
            Block::State(decls) => checker.declare_all(decls),
            Block::Parameters(decls) => checker.declare_all(decls),
            Block::Internals(decls) => checker.declare_all(decls),
            Block::InitialValues(decls) => checker.declare_all(decls),
            Block::Input(ports) => checker.declare_ports(ports),
            _ => {}
        }
    }

    // User function signatures, so calls anywhere in the model (including
    // earlier blocks, textually) resolve regardless of declaration order.
    for block in blocks {
        if let Block::Function(func) = block {
            checker.declare_function_signature(func);
        }
    }

    // Now check initializer expressions against each declaration's type.
    for block in blocks {
        match block {
            Block::State(decls) => checker.check_initializers(decls),
            Block::Parameters(decls) => checker.check_initializers(decls),
            Block::Internals(decls) => checker.check_initializers(decls),
            Block::InitialValues(decls) => checker.check_initializers(decls),
            _ => {}
        }
    }

    // Equations block: shape/ODE right-hand sides.
    for block in blocks {
        if let Block::Equations(entries) = block {
            for entry in entries {
                match entry {
                    EquationsEntry::Ode { rhs, range, .. } => {
                        checker.check_expr(rhs, *range);
                    }
                    EquationsEntry::Shape(shape) => {
                        checker.check_expr(&shape.rhs, shape.range);
                    }
                }
            }
        }
    }

    // Function bodies, then `update`/`pre_spike`/`post_spike`.
    for block in blocks {
        match block {
            Block::Function(func) => checker.check_function_body(func),
            Block::Update(stmts) | Block::PreSpike(stmts) | Block::PostSpike(stmts) => {
                checker.check_statements(stmts, &IndexMap::new())
            }
            _ => {}
        }
    }

    (
        ModelTypes {
            variables: checker.variables,
            functions: checker.functions,
        },
        checker.diagnostics,
    )
}

struct Checker<'a> {
    symbol_scope: &'a ModelSymbolTable,
    variables: IndexMap<String, Type>,
    functions: IndexMap<String, FunctionSignature>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Checker<'a> {
    fn declare_all(&mut self, decls: &[Declaration]) {
        for decl in decls {
            match physical_type_to_type(&decl.type_name) {
                Ok(ty) => {
                    self.variables.insert(decl.name.clone(), ty);
                }
                Err(message) => {
                    self.diagnostics.push(Diagnostic::error("UnitMismatch", decl.range, message));
                }
            }
        }
    }

    /// Bare `<- spike` ports have no written unit. Real NESTML infers one
    /// from use sites (typically the `convolve` call it feeds); this
    /// checker approximates that with a fixed convention — conductance
    /// (`nS`) for spike ports with no declared unit, the common case in
    /// practice — and records an INFO diagnostic so the approximation is
    /// visible rather than silent (see DESIGN.md's note on this
    /// simplification).
    fn declare_ports(&mut self, ports: &[InputPort]) {
        for port in ports {
            let ty = match &port.type_name {
                Some(pt) => match physical_type_to_type(pt) {
                    Ok(ty) => ty,
                    Err(message) => {
                        self.diagnostics.push(Diagnostic::error("UnitMismatch", port.range, message));
                        continue;
                    }
                },
                None => {
                    if port.is_spike {
                        self.diagnostics.push(Diagnostic::info(
                            "InferredPortUnit",
                            port.range,
                            format!("input port '{}' has no declared unit; inferring conductance (nS) from convention", port.name),
                        ));
                        Type::real(parse_unit_expr("nS").expect("nS is a recognized unit"))
                    } else {
                        Type::real(parse_unit_expr("pA").expect("pA is a recognized unit"))
                    }
                }
            };
            self.variables.insert(port.name.clone(), ty);
        }
    }

    fn declare_function_signature(&mut self, func: &FunctionDecl) {
        let mut parameters = Vec::with_capacity(func.parameters.len());
        for (pname, pty) in &func.parameters {
            match physical_type_to_type(pty) {
                Ok(ty) => parameters.push((pname.clone(), ty)),
                Err(message) => {
                    self.diagnostics.push(Diagnostic::error("UnitMismatch", func.range, message));
                    parameters.push((pname.clone(), Type::dimensionless_real()));
                }
            }
        }
        let return_type = match physical_type_to_type(&func.return_type) {
            Ok(ty) => ty,
            Err(message) => {
                self.diagnostics.push(Diagnostic::error("UnitMismatch", func.range, message));
                Type::void()
            }
        };
        self.functions.insert(func.name.clone(), FunctionSignature { parameters, return_type });
    }

    fn check_initializers(&mut self, decls: &[Declaration]) {
        for decl in decls {
            let Some(init) = &decl.initializer else { continue };
            let Some(declared) = self.variables.get(&decl.name).copied() else { continue };
            let Some(actual) = self.check_expr(init, decl.range) else { continue };
            if !assignable(declared, actual) {
                self.diagnostics.push(Diagnostic::error(
                    "UnitMismatch",
                    decl.range,
                    format!(
                        "cannot initialize '{}' (declared {}) with an expression of type {} — unit mismatch",
                        decl.name,
                        display_type(declared),
                        display_type(actual)
                    ),
                ));
            }
        }
    }

    fn check_function_body(&mut self, func: &FunctionDecl) {
        let mut locals = IndexMap::new();
        for (pname, pty) in &func.parameters {
            if let Ok(ty) = physical_type_to_type(pty) {
                locals.insert(pname.clone(), ty);
            }
        }
        self.check_statements(&func.body, &locals);
    }

    fn check_statements(&mut self, stmts: &[Statement], outer_locals: &IndexMap<String, Type>) {
        let mut locals = outer_locals.clone();
        for stmt in stmts {
            self.check_statement(stmt, &mut locals);
        }
    }

    fn check_statement(&mut self, stmt: &Statement, locals: &mut IndexMap<String, Type>) {
        match stmt {
            Statement::Assignment { lhs, rhs, range } => {
                let rhs_ty = self.check_expr_with_locals(rhs, *range, locals);
                let lhs_ty = self.check_expr_with_locals(lhs, *range, locals);
                if let (Some(l), Some(r)) = (lhs_ty, rhs_ty) {
                    if !assignable(l, r) {
                        self.diagnostics.push(Diagnostic::error(
                            "UnitMismatch",
                            *range,
                            format!("cannot assign {} to a target of type {}", display_type(r), display_type(l)),
                        ));
                    }
                }
            }
            Statement::If(IfStatement {
                condition,
                then_branch,
                elif_branches,
                else_branch,
                range,
            }) => {
                self.check_condition(condition, *range, locals);
                self.check_statements_with_locals(then_branch, locals);
                for (cond, body) in elif_branches {
                    self.check_condition(cond, *range, locals);
                    self.check_statements_with_locals(body, locals);
                }
                if let Some(body) = else_branch {
                    self.check_statements_with_locals(body, locals);
                }
            }
            Statement::For(ForStatement {
                variable,
                start,
                end,
                step,
                body,
                range,
            }) => {
                self.check_expr_with_locals(start, *range, locals);
                self.check_expr_with_locals(end, *range, locals);
                if let Some(step) = step {
                    self.check_expr_with_locals(step, *range, locals);
                }
                let mut inner = locals.clone();
                inner.insert(variable.clone(), Type::integer());
                self.check_statements_with_locals(body, &mut inner);
            }
            Statement::While { condition, body, range } => {
                self.check_condition(condition, *range, locals);
                self.check_statements_with_locals(body, locals);
            }
            Statement::Return(expr) => {
                if let Some(expr) = expr {
                    self.check_expr_with_locals(expr, SourceRange::unknown(), locals);
                }
            }
            Statement::Expr(expr) => {
                self.check_expr_with_locals(expr, SourceRange::unknown(), locals);
            }
        }
    }

    fn check_statements_with_locals(&mut self, stmts: &[Statement], locals: &mut IndexMap<String, Type>) {
        let mut inner = locals.clone();
        for stmt in stmts {
            self.check_statement(stmt, &mut inner);
        }
    }

    fn check_condition(&mut self, expr: &Expr, range: SourceRange, locals: &IndexMap<String, Type>) {
        if let Some(ty) = self.check_expr_with_locals(expr, range, locals) {
            if ty.base != nestml_units::NumericBase::Boolean {
                self.diagnostics.push(Diagnostic::error(
                    "NonBooleanCondition",
                    range,
                    format!("condition must be boolean, found {}", display_type(ty)),
                ));
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr, range: SourceRange) -> Option<Type> {
        let locals = IndexMap::new();
        self.check_expr_with_locals(expr, range, &locals)
    }

    fn check_expr_with_locals(&mut self, expr: &Expr, range: SourceRange, locals: &IndexMap<String, Type>) -> Option<Type> {
        match expr {
            Expr::IntLiteral(_) => Some(Type::integer()),
            Expr::FloatLiteral(_) => Some(Type::dimensionless_real()),
            Expr::StringLiteral(_) => Some(Type::string()),
            Expr::BoolLiteral(_) => Some(Type::boolean()),
            Expr::Variable(name) => self.lookup(name, range, locals),
            Expr::Unary { op, operand, range } => {
                let ty = self.check_expr_with_locals(operand, *range, locals)?;
                match op {
                    UnaryOp::Neg => Some(ty),
                    UnaryOp::Not => {
                        if ty.base != nestml_units::NumericBase::Boolean {
                            self.diagnostics.push(Diagnostic::error(
                                "UnitMismatch",
                                *range,
                                format!("`not` requires a boolean operand, found {}", display_type(ty)),
                            ));
                            None
                        } else {
                            Some(Type::boolean())
                        }
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, range } => self.check_binary(*op, lhs, rhs, *range, locals),
            Expr::Power { base, exponent, range } => self.check_power(base, exponent, *range, locals),
            Expr::Call { name, args, range } => self.check_call(name, args, *range, locals),
            Expr::Convolve { shape, port, range } => self.check_convolve(shape, port, *range),
            Expr::Index { base, index, range } => {
                let base_ty = self.check_expr_with_locals(base, *range, locals);
                let idx_ty = self.check_expr_with_locals(index, *range, locals);
                if let Some(idx_ty) = idx_ty {
                    if idx_ty.base != nestml_units::NumericBase::Integer {
                        self.diagnostics.push(Diagnostic::error(
                            "UnitMismatch",
                            *range,
                            "array index must be an integer".to_string(),
                        ));
                    }
                }
                base_ty
            }
        }
    }

    fn lookup(&mut self, name: &str, range: SourceRange, locals: &IndexMap<String, Type>) -> Option<Type> {
        if let Some(ty) = locals.get(name) {
            return Some(*ty);
        }
        if let Some(ty) = self.variables.get(name) {
            return Some(*ty);
        }
        if name == "t" {
            // The reserved simulation-time variable a direct/delta shape's
            // equation is written in terms of (spec.md §4.6: "f(t) = expr(t)").
            return Some(Type::real(parse_unit_expr("ms").expect("ms is a recognized unit")));
        }
        if self.symbol_scope.lookup(name).is_some() {
            // Declared (e.g. a shape, resolved later by C7) but not yet
            // typed here — dimensionless is the safe default; C7 will
            // replace shapes with concrete typed state.
            return Some(Type::dimensionless_real());
        }
        self.diagnostics.push(Diagnostic::error(
            "UnknownIdentifier",
            range,
            format!("reference to undeclared identifier '{name}'"),
        ));
        None
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, range: SourceRange, locals: &IndexMap<String, Type>) -> Option<Type> {
        let lhs_ty = self.check_expr_with_locals(lhs, range, locals);
        let rhs_ty = self.check_expr_with_locals(rhs, range, locals);
        let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);

        match op {
            BinaryOp::Add | BinaryOp::Sub => match lhs_ty.add(&rhs_ty) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic(range));
                    None
                }
            },
            BinaryOp::Mul => match lhs_ty.mul(&rhs_ty) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic(range));
                    None
                }
            },
            BinaryOp::Div => match lhs_ty.div(&rhs_ty) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic(range));
                    None
                }
            },
            BinaryOp::Mod => {
                if lhs_ty.base != nestml_units::NumericBase::Integer || rhs_ty.base != nestml_units::NumericBase::Integer {
                    self.diagnostics.push(Diagnostic::error("UnitMismatch", range, "`mod` requires integer operands"));
                    None
                } else {
                    Some(Type::integer())
                }
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                let lhs_unit = lhs_ty.unit.unwrap_or_else(UnitVector::dimensionless);
                let rhs_unit = rhs_ty.unit.unwrap_or_else(UnitVector::dimensionless);
                if lhs_ty.is_numeric() && rhs_ty.is_numeric() && !lhs_unit.same_dimension(&rhs_unit) {
                    self.diagnostics.push(Diagnostic::error(
                        "UnitMismatch",
                        range,
                        format!("comparison between incompatible units {} and {}", lhs_unit, rhs_unit),
                    ));
                    None
                } else {
                    Some(Type::boolean())
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                if lhs_ty.base != nestml_units::NumericBase::Boolean || rhs_ty.base != nestml_units::NumericBase::Boolean {
                    self.diagnostics.push(Diagnostic::error("UnitMismatch", range, "logical connective requires boolean operands"));
                    None
                } else {
                    Some(Type::boolean())
                }
            }
        }
    }

    fn check_power(&mut self, base: &Expr, exponent: &Expr, range: SourceRange, locals: &IndexMap<String, Type>) -> Option<Type> {
        let base_ty = self.check_expr_with_locals(base, range, locals)?;
        let literal_exponent = integer_literal_exponent(exponent);
        match literal_exponent {
            Some(n) => match base_ty.pow(Rational::from_int(n)) {
                Ok(ty) => Some(ty),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic(range));
                    None
                }
            },
            None => {
                let exp_ty = self.check_expr_with_locals(exponent, range, locals)?;
                let dimensionless_base = base_ty.unit.map(|u| u.is_dimensionless()).unwrap_or(true);
                if !dimensionless_base {
                    self.diagnostics.push(Diagnostic::error(
                        "NonIntegerPowerOnDimensionedBase",
                        range,
                        format!("non-integer exponent on dimensioned base {}", display_type(base_ty)),
                    ));
                    return None;
                }
                let _ = exp_ty;
                Some(Type::dimensionless_real())
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr], range: SourceRange, locals: &IndexMap<String, Type>) -> Option<Type> {
        if name == "__unit_literal" {
            // args = [number literal, StringLiteral(unit text)]
            let Expr::StringLiteral(unit_text) = &args[1] else {
                return None;
            };
            return match parse_unit_expr(unit_text) {
                Ok(unit) => Some(Type::real(unit)),
                Err(e) => {
                    self.diagnostics.push(e.into_diagnostic(range));
                    None
                }
            };
        }

        let arg_types: Vec<Option<Type>> = args.iter().map(|a| self.check_expr_with_locals(a, range, locals)).collect();
        if arg_types.iter().any(Option::is_none) {
            return None;
        }
        let arg_types: Vec<Type> = arg_types.into_iter().map(Option::unwrap).collect();

        match name {
            "exp" | "ln" | "log10" | "sin" | "cos" | "tan" => {
                self.require_dimensionless(&arg_types, name, range)?;
                Some(Type::dimensionless_real())
            }
            "sqrt" => {
                let ty = *arg_types.first()?;
                match ty.pow(Rational::new(1, 2)) {
                    Ok(ty) => Some(ty),
                    Err(e) => {
                        self.diagnostics.push(e.into_diagnostic(range));
                        None
                    }
                }
            }
            "abs" => arg_types.first().copied(),
            "min" | "max" => {
                let a = *arg_types.first()?;
                let b = *arg_types.get(1)?;
                let a_unit = a.unit.unwrap_or_else(UnitVector::dimensionless);
                let b_unit = b.unit.unwrap_or_else(UnitVector::dimensionless);
                if !a_unit.same_dimension(&b_unit) {
                    self.diagnostics.push(Diagnostic::error(
                        "UnitMismatch",
                        range,
                        format!("'{name}' requires operands of the same dimension, found {a_unit} and {b_unit}"),
                    ));
                    None
                } else {
                    Some(a)
                }
            }
            "steps" => Some(Type::integer()),
            "resolution" => Some(Type::real(parse_unit_expr("ms").expect("ms is a recognized unit"))),
            "random_normal" | "random_uniform" => {
                let a = *arg_types.first()?;
                let b = arg_types.get(1).copied().unwrap_or(a);
                let a_unit = a.unit.unwrap_or_else(UnitVector::dimensionless);
                let b_unit = b.unit.unwrap_or_else(UnitVector::dimensionless);
                if !a_unit.same_dimension(&b_unit) {
                    self.diagnostics.push(Diagnostic::error(
                        "UnitMismatch",
                        range,
                        format!("'{name}' requires arguments of the same dimension, found {a_unit} and {b_unit}"),
                    ));
                    None
                } else {
                    Some(a)
                }
            }
            "emit_spike" => Some(Type::void()),
            "integrate_odes" => Some(Type::void()),
            _ => {
                if let Some(sig) = self.functions.get(name).cloned() {
                    if sig.parameters.len() != arg_types.len() {
                        self.diagnostics.push(Diagnostic::error(
                            "ArityMismatch",
                            range,
                            format!("'{name}' expects {} argument(s), found {}", sig.parameters.len(), arg_types.len()),
                        ));
                        return None;
                    }
                    for ((_, expected), actual) in sig.parameters.iter().zip(arg_types.iter()) {
                        if !assignable(*expected, *actual) {
                            self.diagnostics.push(Diagnostic::error(
                                "UnitMismatch",
                                range,
                                format!(
                                    "argument to '{name}' has type {} but {} was expected",
                                    display_type(*actual),
                                    display_type(*expected)
                                ),
                            ));
                            return None;
                        }
                    }
                    Some(sig.return_type)
                } else {
                    self.diagnostics.push(Diagnostic::error("UnknownFunction", range, format!("call to undeclared function '{name}'")));
                    None
                }
            }
        }
    }

    fn require_dimensionless(&mut self, args: &[Type], name: &str, range: SourceRange) -> Option<()> {
        let ty = *args.first()?;
        let dimensionless = ty.unit.map(|u| u.is_dimensionless()).unwrap_or(true);
        if !dimensionless {
            self.diagnostics.push(Diagnostic::error(
                "UnitMismatch",
                range,
                format!("'{name}' requires a dimensionless argument, found {}", display_type(ty)),
            ));
            return None;
        }
        Some(())
    }

    fn check_convolve(&mut self, shape: &str, port: &str, range: SourceRange) -> Option<Type> {
        let shape_known = self.symbol_scope.lookup(shape).map(|s| s.kind == SymbolKind::Shape).unwrap_or(false);
        let port_ty = self.variables.get(port).copied();
        if !shape_known {
            // Reported properly by CoCo C6 (CoCoConvolveNotCorrectlyProvided);
            // the checker still needs a type to decorate the node with.
            return Some(Type::dimensionless_real());
        }
        // Opaque per spec.md §4.4: approximate convolve's unit as the
        // product of the port's unit with itself, matching the "shape
        // folded against a unit impulse" convention described there.
        match port_ty {
            Some(port_ty) => {
                let unit = port_ty.unit.unwrap_or_else(UnitVector::dimensionless);
                Some(Type::real(unit.mul(&unit)))
            }
            None => Some(Type::dimensionless_real()),
        }
    }
}

fn integer_literal_exponent(expr: &Expr) -> Option<i32> {
    match expr {
        Expr::IntLiteral(n) => Some(*n as i32),
        Expr::Unary { op: UnaryOp::Neg, operand, .. } => integer_literal_exponent(operand).map(|n| -n),
        _ => None,
    }
}

/// RHS is assignable into an LHS of type `declared` iff bases match (with
/// integer->real promotion) and, for reals, dimensions match — scale
/// differences are allowed (spec.md: "mismatching scales are silently
/// converted").
fn assignable(declared: Type, actual: Type) -> bool {
    use nestml_units::NumericBase::*;
    match (declared.base, actual.base) {
        (Real, Real) => {
            let d = declared.unit.unwrap_or_else(UnitVector::dimensionless);
            let a = actual.unit.unwrap_or_else(UnitVector::dimensionless);
            d.same_dimension(&a)
        }
        (Real, Integer) => true,
        (Integer, Integer) => true,
        (Boolean, Boolean) => true,
        (String, String) => true,
        (Void, Void) => true,
        _ => false,
    }
}

fn display_type(ty: Type) -> String {
    match ty.unit {
        Some(unit) => unit.to_string(),
        None => format!("{:?}", ty.base),
    }
}

fn builtin_signatures() -> IndexMap<String, FunctionSignature> {
    // Only entries consulted through the generic `functions` path end up
    // here; built-ins with bespoke unit rules are special-cased directly
    // in `check_call` and never looked up in this map.
    IndexMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn check(source: &str) -> Vec<Diagnostic> {
        let (unit, parse_diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        let (symbols, sym_diags) = nestml_symbols::build_symbol_table(&unit);
        assert!(sym_diags.is_empty(), "unexpected symbol diagnostics: {sym_diags:?}");
        let (_, diags) = check_types(&unit, &symbols);
        diags
    }

    #[test]
    fn matching_units_accepted() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn mismatched_units_rejected() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 0 pA
    end
end
"#,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "UnitMismatch");
    }

    #[test]
    fn integer_promotes_into_real_declaration() {
        let diags = check(
            r#"
neuron N:
    parameters:
        n real = 1
    end
end
"#,
        );
        assert!(diags.is_empty());
    }

    #[test]
    fn scale_mismatch_within_dimension_is_accepted() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 1 V
    end
end
"#,
        );
        assert!(diags.is_empty(), "V and mV share dimension, only scale differs: {diags:?}");
    }

    #[test]
    fn reserved_time_variable_resolves_in_shape_equations() {
        let diags = check(
            r#"
neuron N:
    parameters:
        tau_syn_ex ms = 2 ms
    end
    equations:
        shape g_ex = exp(-t/tau_syn_ex)
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn unknown_identifier_reported() {
        let diags = check(
            r#"
neuron N:
    update:
        x = y + 1
    end
end
"#,
        );
        assert!(diags.iter().any(|d| d.code == "UnknownIdentifier"));
    }

    #[test]
    fn transcendental_function_requires_dimensionless_argument() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    update:
        V_m = exp(V_m)
    end
end
"#,
        );
        assert!(diags.iter().any(|d| d.code == "UnitMismatch"));
    }

    #[test]
    fn bare_spike_port_gets_inferred_unit() {
        let diags = check(
            r#"
neuron N:
    input:
        spikes <- spike
    end
end
"#,
        );
        assert!(diags.iter().any(|d| d.code == "InferredPortUnit"));
    }

    #[test]
    fn user_function_call_checks_arity_and_units() {
        let diags = check(
            r#"
neuron N:
    function double(x mV) mV:
        return x * 2
    end
    update:
        double(1 mV)
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }
}
