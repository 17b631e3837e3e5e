//! # nestml-equations
//!
//! C7: canonicalizes the `equations` block into the form C8 consumes.
//!
//! Three jobs:
//!
//! 1. Classify every `shape` entry as [`ShapeKind::Direct`],
//!    [`ShapeKind::OdeDefined`] (order 1 or 2), or [`ShapeKind::Delta`].
//! 2. Inline `function`-tagged aliases at every reference site for
//!    analysis purposes — the original declarations are untouched, so code
//!    generation downstream still sees the alias.
//! 3. Detect affine (linear) right-hand sides over the shape/state
//!    variables an equation depends on, and index every `convolve(...)`
//!    occurrence so C8 knows which equation it came from.
//!
//! The result is an arena-style [`EquationsIr`]: flat maps keyed by name,
//! not a graph of owned nodes, per this workspace's "represent dependency
//! structure as arena + indices, not cyclic ownership" design note —
//! shapes and state ODEs can refer to each other by name without Rust
//! fighting us over ownership.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use nestml_core::{Diagnostic, SourceRange};
use nestml_parser::{Block, CompilationUnit, Declaration, EquationsEntry, Expr, Model, Shape, UnaryOp};
use nestml_symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Direct,
    OdeDefined { order: u8 },
    Delta,
}

#[derive(Debug, Clone)]
pub struct ShapeEntry {
    pub name: String,
    pub kind: ShapeKind,
    /// The shape's equation as written.
    pub rhs: Expr,
    /// The same equation with every `function`-alias reference expanded.
    pub inlined_rhs: Expr,
    pub linear: bool,
    pub depends_on: Vec<String>,
    pub range: SourceRange,
}

#[derive(Debug, Clone)]
pub struct StateOdeEntry {
    pub target: String,
    pub order: u8,
    pub rhs: Expr,
    pub inlined_rhs: Expr,
    pub linear: bool,
    pub depends_on: Vec<String>,
    pub range: SourceRange,
}

#[derive(Debug, Clone)]
pub struct ConvolveOccurrence {
    pub shape: String,
    pub port: String,
    /// Name of the shape or state-ODE target whose RHS this `convolve`
    /// call appears in — spec.md's `containing_expr_id`, approximated by
    /// the containing equation's name since expression nodes don't carry
    /// stable ids across phases.
    pub containing: String,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Default)]
pub struct EquationsIr {
    pub shapes: IndexMap<String, ShapeEntry>,
    pub state_odes: IndexMap<String, StateOdeEntry>,
    pub convolves: Vec<ConvolveOccurrence>,
}

#[derive(Debug, Clone, Default)]
pub struct EquationsAnalysis {
    pub models: IndexMap<String, EquationsIr>,
}

pub fn analyze_equations(unit: &CompilationUnit, _symbols: &SymbolTable) -> (EquationsAnalysis, Vec<Diagnostic>) {
    let mut analysis = EquationsAnalysis::default();
    let mut diagnostics = Vec::new();

    for model in &unit.models {
        let blocks = match model {
            Model::Neuron(n) => &n.blocks,
            Model::Synapse(s) => &s.blocks,
        };
        let (ir, mut model_diags) = analyze_model(blocks);
        diagnostics.append(&mut model_diags);
        analysis.models.insert(model.name().to_string(), ir);
    }

    (analysis, diagnostics)
}

fn analyze_model(blocks: &[Block]) -> (EquationsIr, Vec<Diagnostic>) {
    let aliases = collect_aliases(blocks);
    let mut ir = EquationsIr::default();
    let diagnostics = Vec::new();

    let Some(Block::Equations(entries)) = blocks.iter().find(|b| matches!(b, Block::Equations(_))) else {
        return (ir, diagnostics);
    };

    for entry in entries {
        match entry {
            EquationsEntry::Shape(shape) => {
                let entry = classify_shape(shape, &aliases);
                for occ in find_convolves(&entry.rhs, &entry.name) {
                    ir.convolves.push(occ);
                }
                ir.shapes.insert(entry.name.clone(), entry);
            }
            EquationsEntry::Ode { target, order, rhs, range } => {
                let target = target.trim_end_matches('\'').to_string();
                let mut visiting = HashSet::new();
                let inlined_rhs = inline_aliases(rhs, &aliases, &mut visiting);
                let depends_on = dependency_names(&inlined_rhs);
                let linear = is_affine(&inlined_rhs, &depends_on.iter().cloned().collect());
                for occ in find_convolves(rhs, &target) {
                    ir.convolves.push(occ);
                }
                ir.state_odes.insert(
                    target.clone(),
                    StateOdeEntry {
                        target,
                        order: *order,
                        rhs: rhs.clone(),
                        inlined_rhs,
                        linear,
                        depends_on,
                        range: *range,
                    },
                );
            }
        }
    }

    (ir, diagnostics)
}

fn classify_shape(shape: &Shape, aliases: &HashMap<String, Expr>) -> ShapeEntry {
    let mut visiting = HashSet::new();
    let inlined_rhs = inline_aliases(&shape.rhs, aliases, &mut visiting);
    let depends_on = dependency_names(&inlined_rhs);

    let kind = if shape.order == 0 {
        if is_delta_call(&shape.rhs) {
            ShapeKind::Delta
        } else {
            ShapeKind::Direct
        }
    } else {
        ShapeKind::OdeDefined { order: shape.order }
    };

    let linear = match kind {
        ShapeKind::Delta => true,
        _ => is_affine(&inlined_rhs, &depends_on.iter().cloned().collect()),
    };

    ShapeEntry {
        name: shape.name.clone(),
        kind,
        rhs: shape.rhs.clone(),
        inlined_rhs,
        linear,
        depends_on,
        range: shape.range,
    }
}

fn is_delta_call(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { name, .. } if name == "delta")
}

/// Every `function`-tagged declaration across the declaration-bearing
/// blocks, by name, so `equations` entries can reference parameter-space
/// aliases and have them expanded for linearity analysis.
fn collect_aliases(blocks: &[Block]) -> HashMap<String, Expr> {
    let mut aliases = HashMap::new();
    for block in blocks {
        let decls: &[Declaration] = match block {
            Block::State(d) | Block::Parameters(d) | Block::Internals(d) | Block::InitialValues(d) => d,
            _ => continue,
        };
        for decl in decls {
            if decl.is_function {
                if let Some(init) = &decl.initializer {
                    aliases.insert(decl.name.clone(), init.clone());
                }
            }
        }
    }
    aliases
}

/// Substitutes every `Variable(name)` whose name is a known alias with that
/// alias's (recursively inlined) initializer. `visiting` breaks cycles —
/// C6's `CoCoCyclicAlias` rule is responsible for diagnosing those; this
/// function just has to not loop forever when one slips through.
fn inline_aliases(expr: &Expr, aliases: &HashMap<String, Expr>, visiting: &mut HashSet<String>) -> Expr {
    match expr {
        Expr::Variable(name) => {
            if let Some(alias_expr) = aliases.get(name) {
                if visiting.insert(name.clone()) {
                    let inlined = inline_aliases(alias_expr, aliases, visiting);
                    visiting.remove(name);
                    return inlined;
                }
            }
            expr.clone()
        }
        Expr::Unary { op, operand, range } => Expr::Unary {
            op: *op,
            operand: Box::new(inline_aliases(operand, aliases, visiting)),
            range: *range,
        },
        Expr::Binary { op, lhs, rhs, range } => Expr::Binary {
            op: *op,
            lhs: Box::new(inline_aliases(lhs, aliases, visiting)),
            rhs: Box::new(inline_aliases(rhs, aliases, visiting)),
            range: *range,
        },
        Expr::Power { base, exponent, range } => Expr::Power {
            base: Box::new(inline_aliases(base, aliases, visiting)),
            exponent: Box::new(inline_aliases(exponent, aliases, visiting)),
            range: *range,
        },
        Expr::Call { name, args, range } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(|a| inline_aliases(a, aliases, visiting)).collect(),
            range: *range,
        },
        Expr::Index { base, index, range } => Expr::Index {
            base: Box::new(inline_aliases(base, aliases, visiting)),
            index: Box::new(inline_aliases(index, aliases, visiting)),
            range: *range,
        },
        Expr::Convolve { .. } | Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::StringLiteral(_) | Expr::BoolLiteral(_) => expr.clone(),
    }
}

fn dependency_names(expr: &Expr) -> Vec<String> {
    let mut names = Vec::new();
    fn walk(expr: &Expr, names: &mut Vec<String>) {
        match expr {
            Expr::Variable(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Expr::Unary { operand, .. } => walk(operand, names),
            Expr::Binary { lhs, rhs, .. } => {
                walk(lhs, names);
                walk(rhs, names);
            }
            Expr::Power { base, exponent, .. } => {
                walk(base, names);
                walk(exponent, names);
            }
            Expr::Call { args, .. } => {
                for a in args {
                    walk(a, names);
                }
            }
            Expr::Index { base, index, .. } => {
                walk(base, names);
                walk(index, names);
            }
            Expr::Convolve { shape, port, .. } => {
                if !names.contains(shape) {
                    names.push(shape.clone());
                }
                if !names.contains(port) {
                    names.push(port.clone());
                }
            }
            Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::StringLiteral(_) | Expr::BoolLiteral(_) => {}
        }
    }
    walk(expr, &mut names);
    names
}

fn find_convolves(expr: &Expr, containing: &str) -> Vec<ConvolveOccurrence> {
    let mut out = Vec::new();
    fn walk(expr: &Expr, containing: &str, out: &mut Vec<ConvolveOccurrence>) {
        match expr {
            Expr::Convolve { shape, port, range } => out.push(ConvolveOccurrence {
                shape: shape.clone(),
                port: port.clone(),
                containing: containing.to_string(),
                range: *range,
            }),
            Expr::Unary { operand, .. } => walk(operand, containing, out),
            Expr::Binary { lhs, rhs, .. } => {
                walk(lhs, containing, out);
                walk(rhs, containing, out);
            }
            Expr::Power { base, exponent, .. } => {
                walk(base, containing, out);
                walk(exponent, containing, out);
            }
            Expr::Call { args, .. } => {
                for a in args {
                    walk(a, containing, out);
                }
            }
            Expr::Index { base, index, .. } => {
                walk(base, containing, out);
                walk(index, containing, out);
            }
            _ => {}
        }
    }
    walk(expr, containing, &mut out);
    out
}

/// Returns the polynomial degree of `expr` with respect to `unknowns`, or
/// `None` if `expr` isn't a polynomial in them (a call with a non-constant
/// argument, division by a non-constant, a non-integer power of a
/// non-constant). An expression is affine iff its degree is `Some(0)` or
/// `Some(1)`.
fn polynomial_degree(expr: &Expr, unknowns: &HashSet<String>) -> Option<u32> {
    match expr {
        Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::StringLiteral(_) | Expr::BoolLiteral(_) => Some(0),
        Expr::Variable(name) => Some(if unknowns.contains(name) { 1 } else { 0 }),
        Expr::Convolve { shape, .. } => Some(if unknowns.contains(shape) { 1 } else { 0 }),
        Expr::Unary { op: UnaryOp::Neg, operand, .. } => polynomial_degree(operand, unknowns),
        Expr::Unary { op: UnaryOp::Not, .. } => None,
        Expr::Binary { op, lhs, rhs, .. } => {
            use nestml_parser::BinaryOp::*;
            let l = polynomial_degree(lhs, unknowns);
            let r = polynomial_degree(rhs, unknowns);
            match op {
                Add | Sub => match (l, r) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                },
                Mul => match (l, r) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                },
                Div => match (l, r) {
                    (Some(a), Some(0)) => Some(a),
                    _ => None,
                },
                _ => None, // comparisons/logic don't appear in a well-formed ODE RHS
            }
        }
        Expr::Power { base, exponent, .. } => {
            let base_degree = polynomial_degree(base, unknowns)?;
            match integer_literal(exponent) {
                Some(n) if n >= 0 => Some(base_degree * n as u32),
                _ if base_degree == 0 => Some(0),
                _ => None,
            }
        }
        Expr::Call { args, .. } => {
            let degrees: Option<Vec<u32>> = args.iter().map(|a| polynomial_degree(a, unknowns)).collect();
            let degrees = degrees?;
            if degrees.iter().all(|d| *d == 0) {
                Some(0)
            } else {
                None
            }
        }
        Expr::Index { base, .. } => polynomial_degree(base, unknowns),
    }
}

fn integer_literal(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::IntLiteral(n) => Some(*n),
        Expr::Unary { op: UnaryOp::Neg, operand, .. } => integer_literal(operand).map(|n| -n),
        _ => None,
    }
}

fn is_affine(expr: &Expr, unknowns: &HashSet<String>) -> bool {
    matches!(polynomial_degree(expr, unknowns), Some(0) | Some(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn analyze(source: &str) -> EquationsIr {
        let (unit, parse_diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        let (symbols, _) = nestml_symbols::build_symbol_table(&unit);
        let (analysis, diags) = analyze_equations(&unit, &symbols);
        assert!(diags.is_empty());
        analysis.models["N"].clone()
    }

    #[test]
    fn direct_shape_is_classified_and_linear() {
        let ir = analyze(
            r#"
neuron N:
    equations:
        shape g_ex = exp(-t/tau_syn_ex)
    end
end
"#,
        );
        let shape = &ir.shapes["g_ex"];
        assert_eq!(shape.kind, ShapeKind::Direct);
        assert!(shape.linear, "exp(-t/tau) is affine in its (empty) unknown set");
    }

    #[test]
    fn ode_defined_shape_is_classified_by_order() {
        let ir = analyze(
            r#"
neuron N:
    state:
        g_ex nS = 0 nS
    end
    equations:
        shape g_ex' = -g_ex / tau_syn_ex
    end
end
"#,
        );
        let shape = &ir.shapes["g_ex"];
        assert_eq!(shape.kind, ShapeKind::OdeDefined { order: 1 });
        assert!(shape.linear);
    }

    #[test]
    fn delta_shape_is_classified() {
        let ir = analyze(
            r#"
neuron N:
    equations:
        shape f = delta(t)
    end
end
"#,
        );
        assert_eq!(ir.shapes["f"].kind, ShapeKind::Delta);
    }

    #[test]
    fn nonlinear_state_ode_is_flagged() {
        let ir = analyze(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    equations:
        V_m' = V_m * V_m
    end
end
"#,
        );
        assert!(!ir.state_odes["V_m"].linear);
    }

    #[test]
    fn function_alias_is_inlined_for_linearity_analysis() {
        let ir = analyze(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    parameters:
        function rate real = 2
    end
    equations:
        V_m' = V_m * rate
    end
end
"#,
        );
        let ode = &ir.state_odes["V_m"];
        assert!(ode.linear, "multiplying by an inlined constant alias stays affine");
    }

    #[test]
    fn convolve_occurrence_is_indexed() {
        let ir = analyze(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
        g_ex nS = 0 nS
    end
    input:
        spikes <- excitatory spike
    end
    equations:
        shape g_ex = exp(-t/tau)
        V_m' = -convolve(g_ex, spikes) / C_m
    end
end
"#,
        );
        assert_eq!(ir.convolves.len(), 1);
        assert_eq!(ir.convolves[0].shape, "g_ex");
        assert_eq!(ir.convolves[0].port, "spikes");
        assert_eq!(ir.convolves[0].containing, "V_m");
    }
}
