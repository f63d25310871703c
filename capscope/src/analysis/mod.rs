//! Analysis over loaded and symbolized captures
//!
//! Pure functions of a [`Document`](crate::document::Document): nothing here
//! prints or touches the filesystem.

pub mod callgraph;
pub mod hotspots;

pub use callgraph::{AugmentFn, Callgraph, CallgraphFlags, CallgraphNode, NodeId, SymbolSummary};
pub use hotspots::{
    analyze_hotspots, build_hotspot_callgraph, count_samples, function_hotspots, FunctionHotspot, HotspotCounts,
};
