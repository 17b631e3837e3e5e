//! # nestml-symbols
//!
//! C4: two-pass symbol table construction.
//!
//! Pass 1 walks every declaration-bearing block (`state`, `parameters`,
//! `internals`, `initial_values`, `equations` shapes, `input`) and
//! registers each name into the model's flat outer scope, regardless of
//! which block declared it and regardless of source order — this is what
//! lets `parameters` reference a name declared later in `initial_values`
//! (spec.md's forward-reference requirement). Pass 2 then walks `function`
//! declarations, building each one's parameter scope and checking it
//! against the now-complete outer scope: a parameter can only be flagged as
//! shadowing an outer symbol once that outer symbol is known to exist,
//! which is only guaranteed after pass 1 has finished.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use nestml_core::{Diagnostic, SourceRange};
use nestml_parser::{Block, CompilationUnit, InputPort, Model, PortQualifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Variable,
    Function,
    Shape,
    InputPort,
    Neuron,
    Synapse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub block: String,
    pub recordable: bool,
    pub is_function: bool,
    /// Resolved qualifier for `InputPort` symbols; `Excitatory` is filled in
    /// when the source left it implicit (spec.md §4.1's documented default).
    pub qualifier: Option<PortQualifier>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionScope {
    pub parameters: IndexMap<String, Symbol>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSymbolTable {
    pub name: String,
    pub is_synapse: bool,
    pub symbols: IndexMap<String, Symbol>,
    pub functions: IndexMap<String, FunctionScope>,
}

impl ModelSymbolTable {
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    pub models: IndexMap<String, ModelSymbolTable>,
}

pub fn build_symbol_table(unit: &CompilationUnit) -> (SymbolTable, Vec<Diagnostic>) {
    let mut table = SymbolTable::default();
    let mut diagnostics = Vec::new();

    for model in &unit.models {
        let name = model.name().to_string();
        if table.models.contains_key(&name) {
            diagnostics.push(Diagnostic::error(
                "DuplicateModelName",
                model.range(),
                format!("a neuron or synapse named '{name}' is already declared in this compilation unit"),
            ));
            continue;
        }
        let (scope, mut model_diags) = build_model_scope(model);
        diagnostics.append(&mut model_diags);
        table.models.insert(name, scope);
    }

    (table, diagnostics)
}

fn build_model_scope(model: &Model) -> (ModelSymbolTable, Vec<Diagnostic>) {
    let (name, blocks, is_synapse) = match model {
        Model::Neuron(n) => (n.name.clone(), &n.blocks, false),
        Model::Synapse(s) => (s.name.clone(), &s.blocks, true),
    };

    let mut scope = ModelSymbolTable {
        name,
        is_synapse,
        symbols: IndexMap::new(),
        functions: IndexMap::new(),
    };
    let mut diagnostics = Vec::new();

    // --- pass 1: every declaration-bearing block, function names included
    // (but not their parameters) so forward references to a later block
    // resolve during typechecking regardless of declaration order.
    for block in blocks {
        match block {
            Block::State(decls) => register_decls(&mut scope, &mut diagnostics, "state", decls),
            Block::Parameters(decls) => register_decls(&mut scope, &mut diagnostics, "parameters", decls),
            Block::Internals(decls) => register_decls(&mut scope, &mut diagnostics, "internals", decls),
            Block::InitialValues(decls) => register_decls(&mut scope, &mut diagnostics, "initial_values", decls),
            Block::Equations(entries) => {
                for entry in entries {
                    if let nestml_parser::EquationsEntry::Shape(shape) = entry {
                        insert_symbol(
                            &mut scope,
                            &mut diagnostics,
                            Symbol {
                                name: shape.name.clone(),
                                kind: SymbolKind::Shape,
                                block: "equations".to_string(),
                                recordable: false,
                                is_function: false,
                                qualifier: None,
                                range: shape.range,
                            },
                        );
                    }
                }
            }
            Block::Input(ports) => {
                for port in ports {
                    register_input_port(&mut scope, &mut diagnostics, port);
                }
            }
            Block::Function(func) => {
                insert_symbol(
                    &mut scope,
                    &mut diagnostics,
                    Symbol {
                        name: func.name.clone(),
                        kind: SymbolKind::Function,
                        block: "function".to_string(),
                        recordable: false,
                        is_function: true,
                        qualifier: None,
                        range: func.range,
                    },
                );
            }
            Block::Output(_) | Block::Update(_) | Block::PreSpike(_) | Block::PostSpike(_) => {}
        }
    }

    // --- pass 2: function parameter scopes, checked against the complete
    // outer scope built in pass 1.
    for block in blocks {
        if let Block::Function(func) = block {
            let mut fn_scope = FunctionScope::default();
            for (pname, _ty) in &func.parameters {
                if fn_scope.parameters.contains_key(pname) {
                    diagnostics.push(Diagnostic::error(
                        "DuplicateParameter",
                        func.range,
                        format!("parameter '{pname}' is declared more than once in function '{}'", func.name),
                    ));
                    continue;
                }
                if scope.symbols.contains_key(pname) {
                    diagnostics.push(Diagnostic::warn(
                        "ParameterShadowsOuterSymbol",
                        func.range,
                        format!("parameter '{pname}' of function '{}' shadows an outer-scope symbol of the same name", func.name),
                    ));
                }
                fn_scope.parameters.insert(
                    pname.clone(),
                    Symbol {
                        name: pname.clone(),
                        kind: SymbolKind::Variable,
                        block: "function-parameter".to_string(),
                        recordable: false,
                        is_function: false,
                        qualifier: None,
                        range: func.range,
                    },
                );
            }
            scope.functions.insert(func.name.clone(), fn_scope);
        }
    }

    (scope, diagnostics)
}

fn register_decls(
    scope: &mut ModelSymbolTable,
    diagnostics: &mut Vec<Diagnostic>,
    block_name: &str,
    decls: &[nestml_parser::Declaration],
) {
    for decl in decls {
        insert_symbol(
            scope,
            diagnostics,
            Symbol {
                name: decl.name.clone(),
                kind: SymbolKind::Variable,
                block: block_name.to_string(),
                recordable: decl.recordable,
                is_function: decl.is_function,
                qualifier: None,
                range: decl.range,
            },
        );
    }
}

fn register_input_port(scope: &mut ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>, port: &InputPort) {
    let qualifier = port.qualifier.or(Some(PortQualifier::Excitatory));
    insert_symbol(
        scope,
        diagnostics,
        Symbol {
            name: port.name.clone(),
            kind: SymbolKind::InputPort,
            block: "input".to_string(),
            recordable: false,
            is_function: false,
            qualifier,
            range: port.range,
        },
    );
}

fn insert_symbol(scope: &mut ModelSymbolTable, diagnostics: &mut Vec<Diagnostic>, symbol: Symbol) {
    if let Some(existing) = scope.symbols.get(&symbol.name) {
        diagnostics.push(Diagnostic::error(
            "DuplicateSymbol",
            symbol.range,
            format!(
                "'{}' is already declared in the '{}' block (first declaration at {})",
                symbol.name, existing.block, existing.range
            ),
        ));
        return;
    }
    scope.symbols.insert(symbol.name.clone(), symbol);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn build(source: &str) -> (SymbolTable, Vec<Diagnostic>) {
        let (unit, parse_diags) = nestml_parser::parse_file(&PathBuf::from("m.nestml"), source, None);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        build_symbol_table(&unit)
    }

    #[test]
    fn forward_reference_across_blocks_is_allowed_to_coexist() {
        let (table, diags) = build(
            r#"
neuron N:
    parameters:
        tau ms = 10 ms
    end
    state:
        V_m mV = E_L
    end
    initial_values:
        E_L mV = -70 mV
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let model = &table.models["N"];
        assert!(model.lookup("tau").is_some());
        assert!(model.lookup("V_m").is_some());
        assert!(model.lookup("E_L").is_some());
    }

    #[test]
    fn duplicate_symbol_across_blocks_is_an_error() {
        let (_, diags) = build(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    parameters:
        V_m mV = 0 mV
    end
end
"#,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "DuplicateSymbol");
    }

    #[test]
    fn function_parameter_shadowing_outer_symbol_is_a_warning() {
        let (_, diags) = build(
            r#"
neuron N:
    state:
        x real = 0
    end
    function f(x real) real:
        return x
    end
end
"#,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "ParameterShadowsOuterSymbol");
    }

    #[test]
    fn input_port_without_qualifier_defaults_to_excitatory() {
        let (table, diags) = build(
            r#"
neuron N:
    input:
        spikes <- spike
    end
end
"#,
        );
        assert!(diags.is_empty());
        let model = &table.models["N"];
        let port = model.lookup("spikes").unwrap();
        assert_eq!(port.qualifier, Some(PortQualifier::Excitatory));
    }

    #[test]
    fn duplicate_model_names_are_rejected() {
        let (_, diags) = build(
            r#"
neuron N:
end
neuron N:
end
"#,
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "DuplicateModelName");
    }
}
