//! The transformation framework (§4.9): the op→handler dispatch used
//! by both target-specific lowering and double-word lowering.

use std::collections::HashMap;

use firm_asm::Op;

use crate::error::Result;
use crate::graph::{Graph, NodeId};

/// A per-opcode rewrite handler.
///
/// Receives the node being transformed and the correspondence table
/// built so far (so a handler can look up whether an input has already
/// been transformed); returns the replacement node. Returning the same
/// `old` id is the identity transform.
pub type Handler = Box<dyn FnMut(&mut Graph, NodeId, &Correspondence) -> Result<NodeId>>;

/// The `old -> new` node correspondence accumulated during a
/// transformation walk.
#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    map: HashMap<NodeId, NodeId>,
}

impl Correspondence {
    /// The new node `old` was transformed into, if already visited.
    pub fn get(&self, old: NodeId) -> Option<NodeId> {
        self.map.get(&old).copied()
    }

    fn set(&mut self, old: NodeId, new: NodeId) {
        self.map.insert(old, new);
    }
}

/// An op→handler table owned by one transformation pass (§9:
/// "per-pass behavior ... registered in an op → handler table owned by
/// the pass").
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<Op, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `op`, replacing any previous
    /// registration.
    pub fn register(
        &mut self,
        op: Op,
        handler: impl FnMut(&mut Graph, NodeId, &Correspondence) -> Result<NodeId> + 'static,
    ) {
        self.handlers.insert(op, Box::new(handler));
    }

    /// `true` if `op` has a registered handler.
    pub fn has_handler(&self, op: Op) -> bool {
        self.handlers.contains_key(&op)
    }
}

/// Walks every node reachable from `end`/anchors, invoking `pre` first
/// (if given) and then, for each node whose opcode has a registered
/// handler, invoking it to produce a replacement. Phi nodes are
/// revisited once more after the main walk so their inputs can be
/// fixed up against the now-complete correspondence table (§4.9: "the
/// framework revisits Phis at the end to fix inputs").
pub fn transform_graph(
    graph: &mut Graph,
    table: &mut HandlerTable,
    mut pre: Option<&mut dyn FnMut(&mut Graph, NodeId)>,
) -> Result<Correspondence> {
    let mut corr = Correspondence::default();
    let order = graph.reachable_from_end_and_anchors();
    let mut phis = Vec::new();

    for n in order {
        if let Some(pre) = pre.as_deref_mut() {
            pre(graph, n);
        }
        if graph.node(n).op() == Op::Phi {
            phis.push(n);
        }
        if let Some(handler) = table.handlers.get_mut(&graph.node(n).op()) {
            let new = handler(graph, n, &corr)?;
            corr.set(n, new);
        } else {
            corr.set(n, n);
        }
    }

    for phi in phis {
        let Some(&new_phi) = corr.map.get(&phi) else {
            continue;
        };
        let arity = graph.arity(new_phi);
        for i in 0..arity {
            let old_input = graph.input(phi, i as i32)?;
            if let Some(&new_input) = corr.map.get(&old_input) {
                if new_input != graph.input(new_phi, i as i32)? {
                    graph.set_input(new_phi, i as i32, new_input)?;
                }
            }
        }
    }

    Ok(corr)
}
