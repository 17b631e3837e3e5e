//! # nestml-parser
//!
//! C2: token stream to AST.
//!
//! Parsing is split from lexing (see `nestml-lexer`) so downstream tools
//! (an LSP, a formatter) can reuse the token stream without paying for a
//! full parse, the same separation the Modelica front-end in this
//! workspace's retrieval pack keeps between its scanner and its class
//! parser.

pub mod ast;
mod parser;

use std::path::Path;

use nestml_core::{derive_package_and_artifact, package_naming_is_ambiguous, Diagnostic, SourceRange};

pub use ast::*;
pub use parser::parse_models;

/// Lex and parse one source file into a [`CompilationUnit`]. `model_root`
/// drives the package/artifact naming rule (spec.md §6); passing `None`
/// falls back to the file stem for both, with a WARN when a root was
/// configured but `file` falls outside it.
pub fn parse_file(file: &Path, source: &str, model_root: Option<&Path>) -> (CompilationUnit, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = nestml_lexer::lex(source);
    let (models, parse_diagnostics) = parse_models(tokens);
    diagnostics.extend(parse_diagnostics);

    let (package, artifact) = derive_package_and_artifact(file, model_root);
    if package_naming_is_ambiguous(file, model_root) {
        diagnostics.push(Diagnostic::warn(
            "PackageNamingAmbiguous",
            SourceRange::unknown(),
            format!(
                "'{}' lies outside the configured model root; package and artifact both default to the file stem",
                file.display()
            ),
        ));
    }

    (
        CompilationUnit {
            package,
            artifact,
            models,
        },
        diagnostics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> (CompilationUnit, Vec<Diagnostic>) {
        parse_file(&PathBuf::from("model.nestml"), source, None)
    }

    #[test]
    fn parses_minimal_neuron() {
        let (unit, diags) = parse(
            r#"
neuron iaf_psc_exp:
    state:
        V_m mV = 0 mV
    end
    equations:
        V_m' = -V_m / tau
    end
    input:
        spikes <- spike
    end
    output:
        spike
    end
    update:
        V_m = V_m + 1 mV
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(unit.models.len(), 1);
        let Model::Neuron(neuron) = &unit.models[0] else {
            panic!("expected neuron");
        };
        assert_eq!(neuron.name, "iaf_psc_exp");
        assert_eq!(neuron.blocks.len(), 5);
    }

    #[test]
    fn parses_convolve_and_shape() {
        let (unit, diags) = parse(
            r#"
neuron N:
    state:
        V_m mV = 0 mV
    end
    equations:
        shape G = exp(-t / tau)
        V_m' = convolve(G, spikes) - V_m
    end
    input:
        spikes <- excitatory spike
    end
    output:
        spike
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let Model::Neuron(neuron) = &unit.models[0] else {
            panic!("expected neuron");
        };
        let Block::Equations(entries) = &neuron.blocks[1] else {
            panic!("expected equations block");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn parses_synapse_with_pre_post_spike_blocks() {
        let (unit, diags) = parse(
            r#"
synapse static_synapse:
    state:
        w real = 1
    end
    pre_spike:
        emit_spike()
    end
    post_spike:
        w = w + 1
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let Model::Synapse(synapse) = &unit.models[0] else {
            panic!("expected synapse");
        };
        assert_eq!(synapse.blocks.len(), 3);
    }

    #[test]
    fn reports_error_and_recovers_on_bad_declaration() {
        let (unit, diags) = parse(
            r#"
neuron N:
    state:
        @@@
        V_m mV = 0 mV
    end
end
"#,
        );
        assert!(!diags.is_empty());
        let Model::Neuron(neuron) = &unit.models[0] else {
            panic!("expected neuron");
        };
        let Block::State(decls) = &neuron.blocks[0] else {
            panic!("expected state block");
        };
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "V_m");
    }

    #[test]
    fn parses_if_elif_else_and_for() {
        let (unit, diags) = parse(
            r#"
neuron N:
    update:
        if V_m > 0 mV:
            V_m = 0 mV
        elif V_m < -70 mV:
            V_m = -70 mV
        else:
            V_m = V_m
        end
        for i in 0 to 10 step 1:
            V_m = V_m + 1 mV
        end
    end
end
"#,
        );
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let Model::Neuron(neuron) = &unit.models[0] else {
            panic!("expected neuron");
        };
        let Block::Update(stmts) = &neuron.blocks[0] else {
            panic!("expected update block");
        };
        assert_eq!(stmts.len(), 2);
    }
}
