//! Pass/property manager (§4.6) and the per-graph scratch-slot
//! reservation protocol (§5).

use tracing::debug_span;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::properties::Properties;

/// A named scratch/link resource a pass may reserve for its exclusive
/// use while it runs (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The generic per-node scratch slot (`IRN_LINK` in §5).
    IrnLink,
    /// The per-block worklist used while fixing up lowered Phis.
    PhiList,
    /// The node-visited epoch counter (exposed as a resource so a pass
    /// that needs an *extra*, nested walk can assert exclusivity).
    IrnVisited,
    /// The type-visited epoch counter.
    TypeVisited,
}

/// A pass's required/provided/invalidated property declaration and its
/// body (§4.6).
pub trait Pass {
    /// Name used in diagnostics and resource-collision errors.
    fn name(&self) -> &'static str;

    /// Properties this pass needs to already hold before it runs.
    fn required(&self) -> Properties {
        Properties::empty()
    }

    /// Properties this pass guarantees hold after it succeeds.
    fn provided(&self) -> Properties {
        Properties::empty()
    }

    /// Properties this pass unconditionally clears on completion
    /// (typically because it may alter control flow).
    fn invalidated(&self) -> Properties {
        Properties::empty()
    }

    /// The pass body.
    fn run(&mut self, graph: &mut Graph) -> Result<()>;
}

/// Ensures `required` holds on `graph`, running producer passes for
/// whatever is missing, then runs `pass`, then applies its
/// provided/invalidated bits.
///
/// This is the "pass requests properties → manager ensures them
/// (running prerequisite passes) → pass walks the graph" control flow
/// from §2.
pub fn run_pass(graph: &mut Graph, pass: &mut dyn Pass) -> Result<()> {
    let _span = debug_span!("pass", name = pass.name()).entered();
    ensure(graph, pass.required())?;
    pass.run(graph)?;
    graph.properties_mut().insert(pass.provided());
    graph.properties_mut().remove(pass.invalidated());
    Ok(())
}

/// Recomputes whichever bits of `required` are currently missing from
/// `graph`'s property set, by invoking the matching built-in producer.
pub fn ensure(graph: &mut Graph, required: Properties) -> Result<()> {
    let missing = required - graph.properties();
    if missing.contains(Properties::CONSISTENT_OUT_EDGES) {
        crate::graph::edges::OutEdges::rebuild(graph);
    }
    if missing.contains(Properties::CONSISTENT_DOMINANCE) {
        crate::dominance::compute_dominance(graph)?;
    }
    if missing.contains(Properties::CONSISTENT_POST_DOMINANCE) {
        crate::dominance::compute_post_dominance(graph)?;
    }
    if missing.contains(Properties::CONSISTENT_LOOP_INFO) {
        crate::dominance::compute_loop_info(graph)?;
    }
    let still_missing = (Properties::NO_CRITICAL_EDGES
        | Properties::NO_BADS
        | Properties::ONE_RETURN
        | Properties::NO_UNREACHABLE_CODE)
        & missing;
    if !still_missing.is_empty() {
        // These are checked-in properties (the verifier asserts them);
        // there is no producer that can retroactively make them hold,
        // so a pass that requires one must have a precondition the
        // caller is responsible for, and we report that plainly.
        return Err(Error::PreconditionViolation {
            pass: "<ensure>",
            missing: format!("{still_missing:?}"),
        });
    }
    Ok(())
}
