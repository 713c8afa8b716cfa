//! C source generation from a scheduled realtime model.
//!
//! Each scheduled node contributes up to four text fragments; `%%key%%`
//! placeholders are substituted per node (`id`, param values, input port
//! sums, output port locals) and the joined sections are spliced into the
//! engine shell template at its anchor lines.
//!
//! Multi-writer inputs sum at the consuming port: a source set renders as
//! `0`, `pN`, or `(pN + pM + …)`. Epilogues run after every process step so
//! buffered nodes commit their state only once all direct consumers have
//! read the pre-update value; the routine ends by returning the sink sum.

use std::collections::BTreeMap;

use telar_core::model::{ModelNode, PortId, RealtimeModel};

/// The fixed JACK shell every compiled instrument is spliced into.
const ENGINE_SHELL: &str = include_str!("../templates/engine.c");

/// Renders the complete C source for a trimmed, scheduled model.
pub(crate) fn render(model: &RealtimeModel, order: &[usize]) -> String {
    let sections: Vec<NodeSections> = order
        .iter()
        .map(|&index| node_sections(&model.nodes[index]))
        .collect();

    let join = |select: fn(&NodeSections) -> Option<&String>| -> String {
        sections
            .iter()
            .filter_map(select)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let storage = format!(
        "int VAR_COUNT = {count};\ndouble vars[{count}];\n{rest}",
        count = model.var_count,
        rest = join(|s| s.storage.as_ref()),
    );
    let init = join(|s| s.init.as_ref());
    let process = format!(
        "{process}\n{epilogue}\nreturn {out};",
        process = join(|s| s.process.as_ref()),
        epilogue = join(|s| s.process_epilogue.as_ref()),
        out = port_sum(&model.out),
    );

    let source = splice(ENGINE_SHELL, "%%STORAGE%%", "storage", &storage);
    let source = splice(&source, "%%INIT%%", "init", &init);
    splice(&source, "%%PROCESS%%", "process", &process)
}

struct NodeSections {
    storage: Option<String>,
    init: Option<String>,
    process: Option<String>,
    process_epilogue: Option<String>,
}

fn node_sections(node: &ModelNode) -> NodeSections {
    let mut values: BTreeMap<&str, String> = BTreeMap::new();
    values.insert("id", format!("n{}", node.id));
    for (key, value) in &node.def.params {
        values.insert(key.as_str(), value.clone());
    }
    for (key, sources) in &node.inputs {
        values.insert(key.as_str(), port_sum(sources));
    }
    for (key, port) in &node.outputs {
        values.insert(key.as_str(), port_var(*port));
    }

    let apply = |fragment: &Option<String>| {
        fragment.as_ref().map(|template| substitute(template, &values))
    };
    NodeSections {
        storage: apply(&node.def.storage),
        init: apply(&node.def.init),
        process: apply(&node.def.process),
        process_epilogue: apply(&node.def.process_epilogue),
    }
}

fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut text = template.to_string();
    for (key, value) in values {
        text = text.replace(&format!("%%{key}%%"), value);
    }
    text
}

fn port_var(port: PortId) -> String {
    format!("p{port}")
}

/// `0` for no writers, the bare local for one, a parenthesized sum otherwise.
fn port_sum(ports: &[PortId]) -> String {
    match ports {
        [] => "0".to_string(),
        [port] => port_var(*port),
        many => {
            let joined = many.iter().map(|p| port_var(*p)).collect::<Vec<_>>().join(" + ");
            format!("({joined})")
        }
    }
}

/// Replaces the whole line carrying `anchor` with a labelled block.
fn splice(template: &str, anchor: &str, label: &str, content: &str) -> String {
    let mut out = String::with_capacity(template.len() + content.len());
    for line in template.lines() {
        if line.contains(anchor) {
            out.push_str(&format!("/* BEGIN {label} */\n{content}\n/* END {label} */\n"));
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use telar_core::model::RealtimeNodeDef;

    #[test]
    fn port_sums_cover_all_cardinalities() {
        assert_eq!(port_sum(&[]), "0");
        assert_eq!(port_sum(&[4]), "p4");
        assert_eq!(port_sum(&[1, 2, 3]), "(p1 + p2 + p3)");
    }

    #[test]
    fn substitution_fills_every_placeholder_occurrence() {
        let values = BTreeMap::from([("id", "n7".to_string())]);
        assert_eq!(
            substitute("%%id%%_tick = %%id%%_tick + 1;", &values),
            "n7_tick = n7_tick + 1;"
        );
    }

    #[test]
    fn splice_replaces_the_anchor_line() {
        let spliced = splice("a\nint dummy; /* %%X%% */\nb\n", "%%X%%", "x", "CONTENT");
        assert_eq!(spliced, "a\n/* BEGIN x */\nCONTENT\n/* END x */\nb\n");
    }

    #[test]
    fn rendered_source_declares_the_var_table() {
        let mut model = RealtimeModel::new();
        model.add_variable(1, 0.0);
        let port = model.output_port(0, "out").unwrap();
        model.connect_out(port);
        let order = vec![0];

        let source = render(&model, &order);
        assert!(source.contains("int VAR_COUNT = 2;"));
        assert!(source.contains("double vars[2];"));
        assert!(source.contains("vars[1] = 0.0;"));
        assert!(source.contains("double p0 = vars[1];"));
        assert!(source.contains("return p0;"));
    }

    #[test]
    fn epilogues_follow_all_process_steps() {
        let mut model = RealtimeModel::new();
        let delay = model.add_node(RealtimeNodeDef {
            inputs: vec!["in".into()],
            outputs: vec!["out".into()],
            process: Some("double %%out%% = 0; /* read */".into()),
            process_epilogue: Some("/* commit %%in%% */".into()),
            direct: false,
            ..RealtimeNodeDef::default()
        });
        let tap = model.add_node(RealtimeNodeDef {
            inputs: vec!["in".into()],
            outputs: vec!["out".into()],
            process: Some("double %%out%% = %%in%%;".into()),
            direct: true,
            ..RealtimeNodeDef::default()
        });
        let dp = model.output_port(delay, "out").unwrap();
        assert!(model.connect(dp, tap, "in"));
        model.connect_out(model.output_port(tap, "out").unwrap());

        let source = render(&model, &[delay, tap]);
        let commit = source.find("/* commit").unwrap();
        let tap_read = source.find("double p1 = p0;").unwrap();
        assert!(tap_read < commit, "epilogue must come after every process step");
    }
}
