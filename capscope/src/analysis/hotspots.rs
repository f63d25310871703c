//! Hotspot analysis over a callgraph.
//!
//! Ranks functions by how many samples they appear in (total) and how many
//! samples they were executing in (self).
//!
//! # Architecture
//!
//! - **`HotspotCounts`** - callgraph augmentation, filled once per traceable
//! - **`analyze_hotspots()`** - reduce a built callgraph to a sorted list
//!
//! ## Data Flow
//!
//! ```text
//! Traceable
//!     │
//!     └──► Callgraph::build()
//!              │
//!              └──► count_samples()     ← innermost node, walks to root
//!
//! Callgraph<HotspotCounts> ──► analyze_hotspots() ──► Vec<FunctionHotspot>
//! ```
//!
//! Recursion is counted once per sample in the per-function totals, so a
//! function's total never exceeds the number of samples.

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::callgraph::{AugmentFn, Callgraph, CallgraphFlags, NodeId};
use crate::capture::records::Traceable;
use crate::document::{Document, IndexSet};
use crate::domain::CallgraphError;
use crate::symbolization::{Symbol, SymbolKind};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum distinct callers reported per hotspot.
const MAX_CALLERS_PER_HOTSPOT: usize = 5;

// =============================================================================
// AUGMENTATION
// =============================================================================

/// Sample counts attached to every callgraph node and symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotspotCounts {
    /// Samples whose innermost frame is here.
    pub self_count: u64,
    /// Samples passing through here.
    pub total: u64,
}

/// Augmentation callback filling [`HotspotCounts`].
pub fn count_samples(graph: &mut Callgraph<HotspotCounts>, leaf: NodeId, _traceable: &Traceable<'_>) {
    graph.augment_mut(leaf).self_count += 1;
    graph.summary_augment_mut(leaf).self_count += 1;

    let path: Vec<NodeId> = graph.ancestors(leaf).collect();
    let mut counted: Vec<Arc<Symbol>> = Vec::with_capacity(path.len());
    for id in path {
        graph.augment_mut(id).total += 1;
        let symbol = graph.node(id).symbol();
        if !counted.iter().any(|s| s.as_ref() == symbol.as_ref()) {
            counted.push(Arc::clone(symbol));
            graph.summary_augment_mut(id).total += 1;
        }
    }
}

/// Build a callgraph counting self and total samples.
///
/// # Errors
/// [`CallgraphError::Cancelled`] if `cancel` fires.
pub async fn build_hotspot_callgraph(
    document: Arc<Document>,
    flags: CallgraphFlags,
    traceables: IndexSet,
    cancel: CancellationToken,
) -> Result<Callgraph<HotspotCounts>, CallgraphError> {
    let augment: Arc<AugmentFn<HotspotCounts>> = Arc::new(count_samples);
    Callgraph::build(document, flags, traceables, Some(augment), cancel).await
}

// =============================================================================
// FUNCTION HOTSPOT (OUTPUT TYPE)
// =============================================================================

/// A function with aggregated sample counts.
///
/// # Display
///
/// ```text
///  TOTAL    SELF  FUNCTION
///  42.3%   12.0%  blowfish_encrypt [libcrypto.so.3]
///  18.7%   18.7%  memcpy [libc]
/// ```
#[derive(Debug, Clone)]
pub struct FunctionHotspot {
    pub name: String,
    /// Short label of the binary, e.g. "libc" or "Linux".
    pub nick: Option<String>,
    pub binary: Option<String>,
    pub kind: SymbolKind,
    pub self_count: u64,
    pub total_count: u64,
    /// Percentage of all samples (0.0 - 100.0).
    pub self_percent: f64,
    pub total_percent: f64,
    /// Most frequent direct callers first.
    pub callers: Vec<String>,
}

// =============================================================================
// ANALYSIS
// =============================================================================

/// Reduce a callgraph to per-function hotspots, hottest first.
///
/// The synthetic root is left out; processes, threads and context switches
/// are kept since they are useful rows in their own right.
#[must_use]
pub fn analyze_hotspots(graph: &Callgraph<HotspotCounts>) -> Vec<FunctionHotspot> {
    let samples = graph.root().count();
    let percent = |n: u64| if samples > 0 { (n as f64 / samples as f64) * 100.0 } else { 0.0 };

    let mut hotspots: Vec<FunctionHotspot> = graph
        .list_symbols()
        .iter()
        .filter(|s| s.symbol().kind() != SymbolKind::Root)
        .map(|summary| {
            let symbol = summary.symbol();
            let counts = summary.augment();

            let mut callers: Vec<(&Arc<Symbol>, u64)> = summary
                .callers()
                .iter()
                .map(|c| (c, graph.symbol_augment(c).map_or(0, |a| a.total)))
                .collect();
            callers.sort_by_key(|(_, total)| std::cmp::Reverse(*total));

            FunctionHotspot {
                name: symbol.name().to_string(),
                nick: symbol.binary_nick().map(str::to_string),
                binary: symbol.binary_path().map(str::to_string),
                kind: symbol.kind(),
                self_count: counts.self_count,
                total_count: counts.total,
                self_percent: percent(counts.self_count),
                total_percent: percent(counts.total),
                callers: callers
                    .into_iter()
                    .take(MAX_CALLERS_PER_HOTSPOT)
                    .map(|(c, _)| c.name().to_string())
                    .collect(),
            }
        })
        .collect();

    hotspots.sort_by(|a, b| {
        b.total_count
            .cmp(&a.total_count)
            .then_with(|| b.self_count.cmp(&a.self_count))
            .then_with(|| a.name.cmp(&b.name))
    });
    hotspots
}

/// Hotspots that are actual code: user or kernel functions.
#[must_use]
pub fn function_hotspots(graph: &Callgraph<HotspotCounts>) -> Vec<FunctionHotspot> {
    analyze_hotspots(graph)
        .into_iter()
        .filter(|h| matches!(h.kind, SymbolKind::User | SymbolKind::Kernel))
        .collect()
}
