//! The write-only graph dump format (§6): text suitable for feeding a
//! graph visualizer. There is no reader — this is purely a diagnostic
//! export, mirrored on `fuel_vm`'s own debug-dump helpers.

use std::fmt::Write as _;

use crate::graph::{Attr, Graph, NodeId};

/// Renders `graph` as a dump-format document: a `graph: {...}` header
/// followed by one `node: {...}` block per node and one `edge: {...}`
/// block per def-use edge.
pub fn dump_graph(graph: &Graph, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "graph: {{ title: \"{}\" }}", escape(title));

    for id in graph.node_ids() {
        write_node_block(&mut out, graph, id);
    }
    for id in graph.node_ids() {
        write_edge_blocks(&mut out, graph, id);
    }
    out
}

fn write_node_block(out: &mut String, graph: &Graph, id: NodeId) {
    let node = graph.node(id);
    let label = format!("{} {}:{}", node.op(), id.index(), node.mode().name());
    let info1 = attr_summary(node.attr());
    let color = color_for(node.op());
    let _ = writeln!(
        out,
        "node: {{ title: \"n{}\" label: \"{}\" info1: \"{}\" color: {} }}",
        id.index(),
        escape(&label),
        escape(&info1),
        color
    );
}

fn write_edge_blocks(out: &mut String, graph: &Graph, id: NodeId) {
    let node = graph.node(id);
    if let Some(block) = node.block() {
        let _ = writeln!(
            out,
            "edge: {{ sourcename: \"n{}\" targetname: \"n{}\" class: 1 color: gray }}",
            id.index(),
            block.index()
        );
    }
    for (pos, input) in node.inputs().iter().enumerate() {
        let _ = writeln!(
            out,
            "edge: {{ sourcename: \"n{}\" targetname: \"n{}\" label: \"{}\" }}",
            id.index(),
            input.index(),
            pos
        );
    }
}

fn attr_summary(attr: &Attr) -> String {
    match attr {
        Attr::None => String::new(),
        Attr::Const(a) => format!("value={}", a.value.to_decimal().unwrap_or_else(|_| "bad".into())),
        Attr::SymConst(a) => format!("entity={}", a.entity.0),
        Attr::Proj(a) => format!("num={}", a.num),
        Attr::Cmp(a) => format!("rel={}", a.relation),
        Attr::Confirm(a) => format!("rel={}", a.relation),
        Attr::Switch(a) => format!("n_outs={}", a.n_outs),
        Attr::Call(a) => format!("method={}", a.method_type.0),
        Attr::Builtin(a) => format!("kind={}", a.kind),
    }
}

/// A small, stable palette keyed by opcode category, mirroring the
/// libfirm dumper's convention of coloring nodes by kind so a reader
/// can spot control flow, memory and data nodes at a glance.
fn color_for(op: firm_asm::Op) -> &'static str {
    use firm_asm::Op::*;
    match op {
        Block | Start | End | Jmp | Cond | Switch | Return => "lightblue",
        Phi => "gold",
        Load | Store | NoMem => "lightgreen",
        Call | Builtin => "orange",
        Const | SymConst => "gray90",
        Bad | Unknown | Dummy | Id => "red",
        Confirm => "plum",
        _ => "white",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use firm_types::Mode;

    use super::*;
    use crate::graph::builder::Builder;
    use crate::ty::EntityId;

    #[test]
    fn dump_includes_header_and_every_node() {
        let entity = EntityId::from_ref(firm_asm::EntityRef(0));
        let frame = EntityId::from_ref(firm_asm::EntityRef(1));
        let mut graph = Graph::new(entity, frame);
        let start_block = graph.anchors().start_block;
        let mut b = Builder::new(&mut graph);
        let mode = Mode::new_int("Iu32", 32, firm_types::Signedness::Unsigned, 32).unwrap();
        let value = firm_types::Tarval::from_i128(&mode, 1).unwrap();
        let _ = b.new_const(start_block, value);

        let text = dump_graph(&graph, "t");
        assert!(text.starts_with("graph: { title: \"t\" }"));
        assert!(text.contains("node: { title: \"n0\""));
        assert!(text.contains(&format!("node: {{ title: \"n{}\"", graph.node_count() - 1)));
    }
}
