//! # nestml-cocos
//!
//! C6: context conditions ("CoCos") — whole-program well-formedness rules
//! that a context-free grammar cannot express. Each rule in this crate is
//! independent: it reads the AST (and, where needed, the symbol table or
//! resolved types from C4/C5) and appends diagnostics, but never rewrites
//! anything. Running one rule never short-circuits another — the
//! orchestrator wants every CoCo's diagnostics from a single pass, per
//! spec.md's "always runs C1-C6 on every unit" rule.

use nestml_core::{Diagnostic, SourceRange};
use nestml_parser::{
    Block, CompilationUnit, Declaration, EquationsEntry, Expr, ForStatement, IfStatement, InputPort, Model,
    PortQualifier, Statement,
};
use nestml_symbols::{SymbolKind, SymbolTable};
use nestml_typecheck::TypeCheckResult;

/// Reserved because they name a built-in function or the simulation-time
/// variable `t`; redeclaring one as a user symbol shadows behavior the
/// checker and downstream generator both depend on.
const RESERVED_BUILTIN_FUNCTIONS: &[&str] = &[
    "t",
    "exp",
    "ln",
    "log10",
    "sin",
    "cos",
    "tan",
    "sqrt",
    "abs",
    "min",
    "max",
    "steps",
    "resolution",
    "random_normal",
    "random_uniform",
    "emit_spike",
    "integrate_odes",
    "convolve",
];

/// Reserved unit symbols: the common NESTML unit vocabulary plus the base
/// symbols `nestml-units` recognizes.
const RESERVED_UNIT_SYMBOLS: &[&str] = &[
    "mV", "ms", "nS", "pA", "pF", "mmol", "L", "s", "Hz", "m", "g", "V", "A", "F", "S", "Ohm", "W", "C", "K", "mol",
    "cd",
];

pub fn check_cocos(unit: &CompilationUnit, symbols: &SymbolTable, types: &TypeCheckResult) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for model in &unit.models {
        let name = model.name().to_string();
        let Some(scope) = symbols.models.get(&name) else { continue };
        let model_types = types.models.get(&name);

        let blocks = blocks_of(model);

        check_block_cardinality(model, blocks, &mut diagnostics);
        check_ode_targets_declared(blocks, scope, &mut diagnostics);
        check_convolve_usage(blocks, scope, &mut diagnostics);
        check_initial_value_aliases(blocks, scope, &mut diagnostics);
        check_restricted_calls_in_update_only(blocks, &mut diagnostics);
        check_parameters_are_constant(blocks, scope, &mut diagnostics);
        check_port_qualifier_units(blocks, model_types, &mut diagnostics);
        check_no_cyclic_aliases(blocks, &mut diagnostics);
        check_reserved_names(blocks, &mut diagnostics);
        check_function_declarations_have_initializer(blocks, &mut diagnostics);
    }

    diagnostics
}

fn blocks_of(model: &Model) -> &[Block] {
    match model {
        Model::Neuron(n) => &n.blocks,
        Model::Synapse(s) => &s.blocks,
    }
}

// --- generic expression/statement walkers -----------------------------------------------

fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Unary { operand, .. } => walk_expr(operand, f),
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        Expr::Power { base, exponent, .. } => {
            walk_expr(base, f);
            walk_expr(exponent, f);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::Index { base, index, .. } => {
            walk_expr(base, f);
            walk_expr(index, f);
        }
        Expr::Convolve { .. }
        | Expr::IntLiteral(_)
        | Expr::FloatLiteral(_)
        | Expr::StringLiteral(_)
        | Expr::BoolLiteral(_)
        | Expr::Variable(_) => {}
    }
}

fn walk_statements(stmts: &[Statement], f: &mut impl FnMut(&Expr)) {
    for stmt in stmts {
        match stmt {
            Statement::Assignment { lhs, rhs, .. } => {
                walk_expr(lhs, f);
                walk_expr(rhs, f);
            }
            Statement::If(IfStatement {
                condition,
                then_branch,
                elif_branches,
                else_branch,
                ..
            }) => {
                walk_expr(condition, f);
                walk_statements(then_branch, f);
                for (cond, body) in elif_branches {
                    walk_expr(cond, f);
                    walk_statements(body, f);
                }
                if let Some(body) = else_branch {
                    walk_statements(body, f);
                }
            }
            Statement::For(ForStatement { start, end, step, body, .. }) => {
                walk_expr(start, f);
                walk_expr(end, f);
                if let Some(step) = step {
                    walk_expr(step, f);
                }
                walk_statements(body, f);
            }
            Statement::While { condition, body, .. } => {
                walk_expr(condition, f);
                walk_statements(body, f);
            }
            Statement::Return(Some(expr)) => walk_expr(expr, f),
            Statement::Return(None) => {}
            Statement::Expr(expr) => walk_expr(expr, f),
        }
    }
}

/// Collects every `Expr::Convolve` reachable from `expr`, since `walk_expr`
/// stops descending into `Convolve`'s own (non-expression) arguments.
fn collect_convolves<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Convolve { .. } => out.push(expr),
        Expr::Unary { operand, .. } => collect_convolves(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_convolves(lhs, out);
            collect_convolves(rhs, out);
        }
        Expr::Power { base, exponent, .. } => {
            collect_convolves(base, out);
            collect_convolves(exponent, out);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_convolves(arg, out);
            }
        }
        Expr::Index { base, index, .. } => {
            collect_convolves(base, out);
            collect_convolves(index, out);
        }
        _ => {}
    }
}

fn collect_variable_names(expr: &Expr, out: &mut Vec<String>) {
    walk_expr(expr, &mut |e| {
        if let Expr::Variable(name) = e {
            out.push(name.clone());
        }
    });
}

fn collect_call_names<'a>(expr: &'a Expr, out: &mut Vec<(&'a str, SourceRange)>) {
    walk_expr(expr, &mut |e| {
        if let Expr::Call { name, range, .. } = e {
            out.push((name.as_str(), *range));
        }
    });
}

fn trim_primes(name: &str) -> &str {
    name.trim_end_matches('\'')
}

// --- rule: at most one of each block kind; a neuron also needs exactly one output ------

fn check_block_cardinality(model: &Model, blocks: &[Block], diagnostics: &mut Vec<Diagnostic>) {
    use std::collections::HashMap;
    let mut counts: HashMap<&'static str, u32> = HashMap::new();
    let mut outputs = 0u32;
    for block in blocks {
        if matches!(block, Block::Function(_)) {
            continue; // multiple `function` definitions are expected
        }
        *counts.entry(block.kind_name()).or_insert(0) += 1;
        if matches!(block, Block::Output(_)) {
            outputs += 1;
        }
    }
    for (kind, count) in counts {
        if count > 1 && kind != "output" {
            diagnostics.push(Diagnostic::error(
                "CoCoMultipleBlocksOfSameKind",
                SourceRange::unknown(),
                format!("a neuron or synapse may declare at most one '{kind}' block, found {count}"),
            ));
        }
    }
    // A synapse carries `pre_spike`/`post_spike` in place of `input`/`output`
    // (SPEC_FULL.md §10); only a neuron must declare exactly one output port.
    if matches!(model, Model::Neuron(_)) && outputs != 1 {
        diagnostics.push(Diagnostic::error(
            "CoCoOutputPortMissingOrDuplicate",
            SourceRange::unknown(),
            format!("a neuron must declare exactly one 'output' block, found {outputs}"),
        ));
    }
}

// --- rule: every differential-quotient LHS names a state/initial_values variable --------

fn check_ode_targets_declared(blocks: &[Block], scope: &nestml_symbols::ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    for block in blocks {
        let Block::Equations(entries) = block else { continue };
        for entry in entries {
            let (target, order, range) = match entry {
                EquationsEntry::Ode { target, order, range, .. } => (trim_primes(target), *order, *range),
                EquationsEntry::Shape(shape) if shape.order > 0 => (shape.name.as_str(), shape.order, shape.range),
                EquationsEntry::Shape(_) => continue,
            };
            match scope.lookup(target) {
                Some(sym) if sym.block == "state" || sym.block == "initial_values" => {}
                Some(sym) => {
                    diagnostics.push(Diagnostic::error(
                        "CoCoOdeTargetUndeclared",
                        range,
                        format!(
                            "'{target}' is the target of a {}-order derivative but is declared in '{}', not 'state' or 'initial_values'",
                            order, sym.block
                        ),
                    ));
                }
                None => {
                    diagnostics.push(Diagnostic::error(
                        "CoCoOdeTargetUndeclared",
                        range,
                        format!("derivative of undeclared variable '{target}'"),
                    ));
                }
            }
        }
    }
}

// --- rule: convolve(shape, port) — shape must be a SHAPE, port a spike INPUT_PORT -------

fn check_convolve_usage(blocks: &[Block], scope: &nestml_symbols::ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    let mut convolves: Vec<&Expr> = Vec::new();
    for block in blocks {
        match block {
            Block::Equations(entries) => {
                for entry in entries {
                    match entry {
                        EquationsEntry::Ode { rhs, .. } => collect_convolves(rhs, &mut convolves),
                        EquationsEntry::Shape(shape) => collect_convolves(&shape.rhs, &mut convolves),
                    }
                }
            }
            Block::Update(stmts) | Block::PreSpike(stmts) | Block::PostSpike(stmts) => {
                walk_statements(stmts, &mut |e| collect_convolves(e, &mut convolves));
            }
            Block::Function(func) => walk_statements(&func.body, &mut |e| collect_convolves(e, &mut convolves)),
            _ => {}
        }
    }

    for expr in convolves {
        let Expr::Convolve { shape, port, range } = expr else { continue };
        let shape_ok = scope.lookup(shape).map(|s| s.kind == SymbolKind::Shape).unwrap_or(false);
        let port_ok = scope
            .lookup(port)
            .map(|s| s.kind == SymbolKind::InputPort)
            .unwrap_or(false);
        if !shape_ok || !port_ok {
            diagnostics.push(Diagnostic::error(
                "CoCoConvolveNotCorrectlyProvided",
                *range,
                format!(
                    "convolve's first argument must name a shape and its second a spike input port; got '{shape}' ({}) and '{port}' ({})",
                    symbol_kind_description(scope, shape),
                    symbol_kind_description(scope, port)
                ),
            ));
        }
    }
}

fn symbol_kind_description(scope: &nestml_symbols::ModelSymbolTable, name: &str) -> &'static str {
    match scope.lookup(name) {
        Some(sym) => match sym.kind {
            SymbolKind::Shape => "a shape",
            SymbolKind::InputPort => "an input port",
            SymbolKind::Variable => "a variable",
            SymbolKind::Function => "a function",
            SymbolKind::Neuron => "a neuron",
            SymbolKind::Synapse => "a synapse",
        },
        None => "undeclared",
    }
}

// --- rule: initial_values aliases may reference parameters/initial values, not state ----

fn check_initial_value_aliases(blocks: &[Block], scope: &nestml_symbols::ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    for block in blocks {
        let Block::InitialValues(decls) = block else { continue };
        for decl in decls {
            if !decl.is_function {
                continue;
            }
            let Some(init) = &decl.initializer else { continue };
            let mut refs = Vec::new();
            collect_variable_names(init, &mut refs);
            for r in &refs {
                if r == &decl.name {
                    diagnostics.push(Diagnostic::error(
                        "CoCoInitialValueAliasSelfReference",
                        decl.range,
                        format!("initial-value alias '{}' cannot reference itself", decl.name),
                    ));
                    continue;
                }
                if let Some(sym) = scope.lookup(r) {
                    if sym.block == "state" {
                        diagnostics.push(Diagnostic::error(
                            "CoCoInitialValueAliasReferencesState",
                            decl.range,
                            format!(
                                "initial-value alias '{}' may only reference parameters and other initial values, not state variable '{}'",
                                decl.name, r
                            ),
                        ));
                    }
                }
            }
        }
    }
}

// --- rule: integrate_odes()/emit_spike() only callable inside `update` -----------------

fn check_restricted_calls_in_update_only(blocks: &[Block], diagnostics: &mut Vec<Diagnostic>) {
    const RESTRICTED: [&str; 2] = ["integrate_odes", "emit_spike"];

    let check_stmts = |stmts: &[Statement], diagnostics: &mut Vec<Diagnostic>| {
        let mut calls = Vec::new();
        walk_statements(stmts, &mut |e| collect_call_names(e, &mut calls));
        for (name, range) in calls {
            if RESTRICTED.contains(&name) {
                diagnostics.push(Diagnostic::error(
                    "CoCoRestrictedFunctionOutsideUpdate",
                    range,
                    format!("'{name}()' may only be called inside 'update'"),
                ));
            }
        }
    };

    for block in blocks {
        match block {
            Block::Update(_) => {} // allowed here
            Block::PreSpike(stmts) | Block::PostSpike(stmts) => check_stmts(stmts, diagnostics),
            Block::Function(func) => check_stmts(&func.body, diagnostics),
            Block::Equations(entries) => {
                for entry in entries {
                    let rhs = match entry {
                        EquationsEntry::Ode { rhs, .. } => rhs,
                        EquationsEntry::Shape(shape) => &shape.rhs,
                    };
                    let mut calls = Vec::new();
                    collect_call_names(rhs, &mut calls);
                    for (name, range) in calls {
                        if RESTRICTED.contains(&name) {
                            diagnostics.push(Diagnostic::error(
                                "CoCoRestrictedFunctionOutsideUpdate",
                                range,
                                format!("'{name}()' may only be called inside 'update'"),
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

// --- rule: parameters initialized with constant expressions only ----------------------

fn check_parameters_are_constant(blocks: &[Block], scope: &nestml_symbols::ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    for block in blocks {
        let Block::Parameters(decls) = block else { continue };
        for decl in decls {
            let Some(init) = &decl.initializer else { continue };
            let mut refs = Vec::new();
            collect_variable_names(init, &mut refs);
            for r in refs {
                let is_parameter = scope.lookup(&r).map(|s| s.block == "parameters").unwrap_or(false);
                if !is_parameter {
                    diagnostics.push(Diagnostic::error(
                        "CoCoParameterNotConstant",
                        decl.range,
                        format!(
                            "parameter '{}' must be initialized from a constant expression; it references '{}', which is not a parameter",
                            decl.name, r
                        ),
                    ));
                }
            }
        }
    }
}

// --- rule: inhibitory/excitatory spike ports must share a unit when both present --------

fn check_port_qualifier_units(blocks: &[Block], model_types: Option<&nestml_typecheck::ModelTypes>, diagnostics: &mut Vec<Diagnostic>) {
    let Some(model_types) = model_types else { return };
    let mut inhibitory: Option<&InputPort> = None;
    let mut excitatory: Option<&InputPort> = None;
    for block in blocks {
        let Block::Input(ports) = block else { continue };
        for port in ports {
            match port.qualifier {
                Some(PortQualifier::Inhibitory) => inhibitory = Some(port),
                Some(PortQualifier::Excitatory) => excitatory = Some(port),
                _ => {}
            }
        }
    }
    if let (Some(inh), Some(exc)) = (inhibitory, excitatory) {
        let inh_ty = model_types.type_of(&inh.name);
        let exc_ty = model_types.type_of(&exc.name);
        if let (Some(inh_ty), Some(exc_ty)) = (inh_ty, exc_ty) {
            let inh_unit = inh_ty.unit.unwrap_or_else(nestml_units::UnitVector::dimensionless);
            let exc_unit = exc_ty.unit.unwrap_or_else(nestml_units::UnitVector::dimensionless);
            if !inh_unit.same_dimension(&exc_unit) {
                diagnostics.push(Diagnostic::error(
                    "CoCoPortUnitMismatch",
                    inh.range,
                    format!(
                        "inhibitory port '{}' ({inh_unit}) and excitatory port '{}' ({exc_unit}) must share a unit",
                        inh.name, exc.name
                    ),
                ));
            }
        }
    }
}

// --- rule: no cyclic dependency among function-aliases ---------------------------------

fn check_no_cyclic_aliases(blocks: &[Block], diagnostics: &mut Vec<Diagnostic>) {
    use std::collections::HashMap;

    let mut aliases: HashMap<String, (Vec<String>, SourceRange)> = HashMap::new();
    for block in blocks {
        let decls: &[Declaration] = match block {
            Block::State(d) | Block::Parameters(d) | Block::Internals(d) | Block::InitialValues(d) => d,
            _ => continue,
        };
        for decl in decls {
            if !decl.is_function {
                continue;
            }
            let Some(init) = &decl.initializer else { continue };
            let mut refs = Vec::new();
            collect_variable_names(init, &mut refs);
            aliases.insert(decl.name.clone(), (refs, decl.range));
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut reported: std::collections::HashSet<String> = std::collections::HashSet::new();

    fn visit(
        name: &str,
        aliases: &HashMap<String, (Vec<String>, SourceRange)>,
        marks: &mut HashMap<String, Mark>,
        stack: &mut Vec<String>,
        diagnostics: &mut Vec<Diagnostic>,
        reported: &mut std::collections::HashSet<String>,
    ) {
        if let Some(Mark::Done) = marks.get(name) {
            return;
        }
        if marks.get(name) == Some(&Mark::Visiting) {
            if !reported.contains(name) {
                let range = aliases.get(name).map(|(_, r)| *r).unwrap_or(SourceRange::unknown());
                diagnostics.push(Diagnostic::error(
                    "CoCoCyclicAlias",
                    range,
                    format!("cyclic dependency among function-aliases involving '{name}': {}", stack.join(" -> ")),
                ));
                reported.insert(name.to_string());
            }
            return;
        }
        let Some((deps, _)) = aliases.get(name) else { return };
        marks.insert(name.to_string(), Mark::Visiting);
        stack.push(name.to_string());
        for dep in deps.clone() {
            if aliases.contains_key(&dep) {
                visit(&dep, aliases, marks, stack, diagnostics, reported);
            }
        }
        stack.pop();
        marks.insert(name.to_string(), Mark::Done);
    }

    let names: Vec<String> = aliases.keys().cloned().collect();
    for name in names {
        let mut stack = Vec::new();
        visit(&name, &aliases, &mut marks, &mut stack, diagnostics, &mut reported);
    }
}

// --- rule: a `function`-flagged declaration must carry an initializer -------------------

fn check_function_declarations_have_initializer(blocks: &[Block], diagnostics: &mut Vec<Diagnostic>) {
    for block in blocks {
        let decls: &[Declaration] = match block {
            Block::State(d) | Block::Parameters(d) | Block::Internals(d) | Block::InitialValues(d) => d,
            _ => continue,
        };
        for decl in decls {
            if decl.is_function && decl.initializer.is_none() {
                diagnostics.push(Diagnostic::error(
                    "CoCoFunctionDeclarationMissingInitializer",
                    decl.range,
                    format!("'function {}' is recomputed from its initializer on every reference and must declare one", decl.name),
                ));
            }
        }
    }
}

// --- rule: reserved names may not be redeclared ----------------------------------------

fn check_reserved_names(blocks: &[Block], diagnostics: &mut Vec<Diagnostic>) {
    let mut check_name = |name: &str, range: SourceRange, diagnostics: &mut Vec<Diagnostic>| {
        if RESERVED_BUILTIN_FUNCTIONS.contains(&name) || RESERVED_UNIT_SYMBOLS.contains(&name) {
            diagnostics.push(Diagnostic::error(
                "CoCoReservedNameRedeclared",
                range,
                format!("'{name}' is a reserved name (built-in function or unit symbol) and cannot be redeclared"),
            ));
        }
    };

    for block in blocks {
        match block {
            Block::State(d) | Block::Parameters(d) | Block::Internals(d) | Block::InitialValues(d) => {
                for decl in d {
                    check_name(&decl.name, decl.range, diagnostics);
                }
            }
            Block::Input(ports) => {
                for port in ports {
                    check_name(&port.name, port.range, diagnostics);
                }
            }
            Block::Function(func) => check_name(&func.name, func.range, diagnostics),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn check(source: &str) -> Vec<Diagnostic> {
        let (unit, parse_diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        let (symbols, _) = nestml_symbols::build_symbol_table(&unit);
        let (types, _) = nestml_typecheck::check_types(&unit, &symbols);
        check_cocos(&unit, &symbols, &types)
    }

    fn codes(diags: &[Diagnostic]) -> Vec<&str> {
        diags.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn valid_model_passes_all_cocos() {
        let diags = check(
            r#"
neuron iaf:
    state:
        V_m mV = 0 mV
    end
    equations:
        V_m' = -V_m / tau
    end
    parameters:
        tau ms = 10 ms
    end
    input:
        spikes nS <- excitatory spike
    end
    output:
        spike
    end
    update:
        integrate_odes()
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }

    #[test]
    fn derivative_of_undeclared_variable_is_an_error() {
        let diags = check(
            r#"
neuron N:
    equations:
        shape f' = 0
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoOdeTargetUndeclared"));
    }

    #[test]
    fn convolve_with_state_variable_as_shape_is_rejected() {
        let diags = check(
            r#"
neuron N:
    state:
        g_ex nS = 0 nS
    end
    input:
        spikes <- excitatory spike
    end
    equations:
        V_m' = convolve(g_ex, spikes)
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoConvolveNotCorrectlyProvided"));
    }

    #[test]
    fn missing_output_block_is_an_error() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoOutputPortMissingOrDuplicate"));
    }

    #[test]
    fn integrate_odes_outside_update_is_rejected() {
        let diags = check(
            r#"
neuron N:
    function f() void:
        integrate_odes()
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoRestrictedFunctionOutsideUpdate"));
    }

    #[test]
    fn parameter_referencing_state_is_rejected() {
        let diags = check(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    parameters:
        k real = V_m
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoParameterNotConstant"));
    }

    #[test]
    fn mismatched_excitatory_inhibitory_units_rejected() {
        let diags = check(
            r#"
neuron N:
    input:
        exc nS <- excitatory spike
        inh pA <- inhibitory spike
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoPortUnitMismatch"));
    }

    #[test]
    fn cyclic_function_alias_is_rejected() {
        let diags = check(
            r#"
neuron N:
    initial_values:
        function a real = b
        function b real = a
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoCyclicAlias"));
    }

    #[test]
    fn reserved_unit_symbol_as_name_is_rejected() {
        let diags = check(
            r#"
neuron N:
    parameters:
        mV real = 1
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoReservedNameRedeclared"));
    }

    #[test]
    fn function_declaration_without_initializer_is_rejected() {
        let diags = check(
            r#"
neuron N:
    parameters:
        function rate real
    end
    output:
        spike
    end
end
"#,
        );
        assert!(codes(&diags).contains(&"CoCoFunctionDeclarationMissingInitializer"));
    }

    #[test]
    fn valid_synapse_with_pre_post_spike_passes_all_cocos() {
        let diags = check(
            r#"
synapse static_synapse:
    state:
        w real = 1
    end
    pre_spike:
        w = w + 1
    end
    post_spike:
        w = w - 1
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    }
}
