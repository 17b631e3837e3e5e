//! Unit-stripping and constant-folding helpers used to build a
//! [`crate::protocol::SolverRequest`] (spec.md §4.7: "unit information is
//! stripped, scales folded into numerical constants, before handoff").

use indexmap::IndexMap;

use nestml_parser::{BinaryOp, Block, Declaration, Expr, UnaryOp};
use nestml_units::parse_unit_expr;

/// Render an expression as a plain arithmetic string for the solver's
/// `expression` field, folding `__unit_literal(n, "unit")` calls (the
/// parser's desugaring of e.g. `10 mV`) into `n * scale` so the solver never
/// sees a unit symbol.
pub fn strip_expr(expr: &Expr) -> String {
    match expr {
        Expr::IntLiteral(n) => n.to_string(),
        Expr::FloatLiteral(n) => format!("{n}"),
        Expr::StringLiteral(s) => format!("\"{s}\""),
        Expr::BoolLiteral(b) => b.to_string(),
        Expr::Variable(name) => name.clone(),
        Expr::Unary { op, operand, .. } => {
            let inner = strip_expr(operand);
            match op {
                UnaryOp::Neg => format!("(-{inner})"),
                UnaryOp::Not => format!("(not {inner})"),
            }
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            format!("({} {} {})", strip_expr(lhs), binary_op_symbol(*op), strip_expr(rhs))
        }
        Expr::Power { base, exponent, .. } => {
            format!("({}**{})", strip_expr(base), strip_expr(exponent))
        }
        Expr::Call { name, args, .. } if name == "__unit_literal" => {
            let (Expr::IntLiteral(_) | Expr::FloatLiteral(_), Expr::StringLiteral(unit_text)) = (&args[0], &args[1]) else {
                return strip_expr(&args[0]);
            };
            let number = match &args[0] {
                Expr::IntLiteral(n) => *n as f64,
                Expr::FloatLiteral(n) => *n,
                _ => unreachable!(),
            };
            let scale = parse_unit_expr(unit_text).map(|u| u.scale).unwrap_or(1.0);
            format!("{}", number * scale)
        }
        Expr::Call { name, args, .. } => {
            let rendered: Vec<String> = args.iter().map(strip_expr).collect();
            format!("{name}({})", rendered.join(", "))
        }
        Expr::Convolve { shape, port, .. } => format!("convolve({shape}, {port})"),
        Expr::Index { base, index, .. } => format!("{}[{}]", strip_expr(base), strip_expr(index)),
    }
}

fn binary_op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Lt => "<",
        BinaryOp::Gt => ">",
        BinaryOp::Le => "<=",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

/// Fold every constant-valued declaration (`parameters`, `internals`,
/// `state`, `initial_values`) into a `name -> f64` table, iterating to a
/// fixpoint since `parameters`/`initial_values` permit forward references
/// within their own block. Declarations whose initializer isn't a constant
/// expression (references something outside this set, or isn't numeric)
/// are simply absent from the result; callers fall back to `0.0`.
pub fn fold_constants(blocks: &[Block]) -> IndexMap<String, f64> {
    let mut pending: Vec<(String, Expr)> = Vec::new();
    for block in blocks {
        let decls: &[Declaration] = match block {
            Block::State(d) | Block::Parameters(d) | Block::Internals(d) | Block::InitialValues(d) => d,
            _ => continue,
        };
        for decl in decls {
            if let Some(init) = &decl.initializer {
                pending.push((decl.name.clone(), init.clone()));
            }
        }
    }

    let mut resolved: IndexMap<String, f64> = IndexMap::new();
    let mut progressed = true;
    while progressed && !pending.is_empty() {
        progressed = false;
        pending.retain(|(name, expr)| {
            if let Some(value) = eval_const(expr, &resolved) {
                resolved.insert(name.clone(), value);
                progressed = true;
                false
            } else {
                true
            }
        });
    }

    resolved
}

/// Evaluate `expr` as a constant numeric value against an already-resolved
/// constant table. Returns `None` for anything non-numeric or referencing an
/// unresolved name (the caller's fixpoint loop retries those next pass).
pub fn eval_const(expr: &Expr, consts: &IndexMap<String, f64>) -> Option<f64> {
    match expr {
        Expr::IntLiteral(n) => Some(*n as f64),
        Expr::FloatLiteral(n) => Some(*n),
        Expr::Variable(name) => consts.get(name).copied(),
        Expr::Unary { op: UnaryOp::Neg, operand, .. } => eval_const(operand, consts).map(|v| -v),
        Expr::Unary { op: UnaryOp::Not, .. } => None,
        Expr::Binary { op, lhs, rhs, .. } => {
            let l = eval_const(lhs, consts)?;
            let r = eval_const(rhs, consts)?;
            match op {
                BinaryOp::Add => Some(l + r),
                BinaryOp::Sub => Some(l - r),
                BinaryOp::Mul => Some(l * r),
                BinaryOp::Div => Some(l / r),
                BinaryOp::Mod => Some(l % r),
                _ => None,
            }
        }
        Expr::Power { base, exponent, .. } => {
            let b = eval_const(base, consts)?;
            let e = eval_const(exponent, consts)?;
            Some(b.powf(e))
        }
        Expr::Call { name, args, .. } if name == "__unit_literal" => {
            let number = eval_const(&args[0], consts)?;
            let Expr::StringLiteral(unit_text) = &args[1] else { return None };
            let scale = parse_unit_expr(unit_text).ok()?.scale;
            Some(number * scale)
        }
        Expr::Call { name, args, .. } if name == "exp" && args.len() == 1 => eval_const(&args[0], consts).map(f64::exp),
        _ => None,
    }
}

/// The initial value a state variable or shape should carry into the
/// solver request: its declared initializer in `state`/`initial_values`,
/// constant-folded, or `0.0` if none is found (a bare `shape f(t) = ...`
/// direct shape has no stored initial value of its own).
pub fn initial_value_of(blocks: &[Block], name: &str, consts: &IndexMap<String, f64>) -> f64 {
    for block in blocks {
        let decls: &[Declaration] = match block {
            Block::State(d) | Block::InitialValues(d) => d,
            _ => continue,
        };
        for decl in decls {
            if decl.name == name {
                return decl
                    .initializer
                    .as_ref()
                    .and_then(|e| eval_const(e, consts))
                    .unwrap_or(0.0);
            }
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn blocks_of(source: &str) -> Vec<Block> {
        let (unit, diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        match &unit.models[0] {
            nestml_parser::Model::Neuron(n) => n.blocks.clone(),
            nestml_parser::Model::Synapse(s) => s.blocks.clone(),
        }
    }

    #[test]
    fn strip_expr_folds_unit_literal_scale() {
        let (unit, _) = nestml_parser::parse_file(
            &PathBuf::from("m.nestml"),
            "neuron N:\n    state:\n        V_m mV = 10 mV\n    end\nend\n",
            None,
        );
        let Block::State(decls) = &match &unit.models[0] {
            nestml_parser::Model::Neuron(n) => &n.blocks,
            _ => unreachable!(),
        }[0] else {
            panic!("expected state block");
        };
        let rendered = strip_expr(decls[0].initializer.as_ref().unwrap());
        assert_eq!(rendered, "0.01");
    }

    #[test]
    fn fold_constants_resolves_forward_references_in_parameters() {
        let blocks = blocks_of(
            r#"
neuron N:
    parameters:
        a real = b + 1
        b real = 2
    end
end
"#,
        );
        let consts = fold_constants(&blocks);
        assert_eq!(consts.get("b"), Some(&2.0));
        assert_eq!(consts.get("a"), Some(&3.0));
    }

    #[test]
    fn initial_value_defaults_to_zero_when_absent() {
        let blocks = blocks_of("neuron N:\nend\n");
        let consts = fold_constants(&blocks);
        assert_eq!(initial_value_of(&blocks, "g_ex", &consts), 0.0);
    }
}
