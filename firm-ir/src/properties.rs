//! Graph property tracking (§3, §4.6).

bitflags::bitflags! {
    /// Structural properties a graph may currently hold.
    ///
    /// The pass manager (§4.6) ensures a pass's required subset holds
    /// before running it (recomputing whatever is missing), then clears
    /// whatever the pass declares it invalidates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Properties: u32 {
        /// The out-edge index (§4.3) reflects the current input arrays.
        const CONSISTENT_OUT_EDGES = 1 << 0;
        /// The dominator tree (§4.4) reflects the current CFG.
        const CONSISTENT_DOMINANCE = 1 << 1;
        /// The post-dominator tree reflects the current CFG.
        const CONSISTENT_POST_DOMINANCE = 1 << 2;
        /// Natural-loop information reflects the current CFG.
        const CONSISTENT_LOOP_INFO = 1 << 3;
        /// No CFG edge goes from a multi-successor block directly to a
        /// multi-predecessor block.
        const NO_CRITICAL_EDGES = 1 << 4;
        /// The graph contains no `Bad` nodes reachable from `end`.
        const NO_BADS = 1 << 5;
        /// Exactly one `Return` is reachable from `end`.
        const ONE_RETURN = 1 << 6;
        /// Every block is reachable from `start`.
        const NO_UNREACHABLE_CODE = 1 << 7;
    }
}

impl Default for Properties {
    fn default() -> Self {
        Properties::empty()
    }
}
