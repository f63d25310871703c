//! Call trees aggregated from symbolized stacks.
//!
//! Every traceable's stack is resolved, extended with its thread, process
//! and the shared root, then walked from the outermost frame inward. Nodes
//! with the same symbol under the same parent merge, so identical call
//! paths share one branch:
//!
//! ```text
//! All Processes (2)
//! └── app (2)
//!     └── main (2)
//!         ├── parse (1)
//!         └── render (1)
//! ```
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Each node
//! and each distinct symbol carries an augmentation value `A` that a
//! caller-supplied callback fills in, once per traceable, starting from the
//! innermost node.

use bitflags::bitflags;
use log::{debug, info};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::capture::records::Traceable;
use crate::capture::AddressContext;
use crate::document::{Document, FrameList, IndexSet};
use crate::domain::{CallgraphError, Pid};
use crate::symbolization::{Symbol, SymbolKind};
use capscope_common as wire;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CallgraphFlags: u32 {
        /// Insert a thread node between each process and its stacks.
        const INCLUDE_THREADS = 1 << 0;
        /// Skip frames from binaries under `/usr/lib*` and `/lib*`.
        const HIDE_SYSTEM_LIBRARIES = 1 << 1;
        /// Innermost frames nearest the root.
        const BOTTOM_UP = 1 << 2;
        const IGNORE_PROCESS_0 = 1 << 3;
        /// Order children by descending count instead of by name.
        const LEFT_HEAVY = 1 << 4;
        /// Group processes by the first word of their command line.
        const MERGE_SIMILAR_PROCESSES = 1 << 5;
        const IGNORE_KERNEL_PROCESSES = 1 << 6;
    }
}

/// Index of a node in its [`Callgraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The "All Processes" node every stack hangs from.
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Called once per traceable with the innermost node it reached.
pub type AugmentFn<A> = dyn Fn(&mut Callgraph<A>, NodeId, &Traceable<'_>) + Send + Sync;

#[derive(Debug, Clone)]
pub struct CallgraphNode<A> {
    symbol: Arc<Symbol>,
    summary: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    count: u64,
    is_toplevel: bool,
    augment: A,
}

impl<A> CallgraphNode<A> {
    #[must_use]
    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of stacks passing through this node.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether some stack ended at this node.
    #[must_use]
    pub fn is_toplevel(&self) -> bool {
        self.is_toplevel
    }

    #[must_use]
    pub fn augment(&self) -> &A {
        &self.augment
    }
}

/// Everything known about one symbol across the whole tree.
#[derive(Debug, Clone)]
pub struct SymbolSummary<A> {
    symbol: Arc<Symbol>,
    /// Distinct symbols directly above this one, excluding processes and the
    /// root.
    callers: Vec<Arc<Symbol>>,
    /// Positions of the traceables whose stacks contain the symbol.
    traceables: IndexSet,
    augment: A,
}

impl<A> SymbolSummary<A> {
    #[must_use]
    pub fn symbol(&self) -> &Arc<Symbol> {
        &self.symbol
    }

    #[must_use]
    pub fn callers(&self) -> &[Arc<Symbol>] {
        &self.callers
    }

    #[must_use]
    pub fn traceables(&self) -> &IndexSet {
        &self.traceables
    }

    #[must_use]
    pub fn augment(&self) -> &A {
        &self.augment
    }
}

pub struct Callgraph<A = ()> {
    document: Arc<Document>,
    flags: CallgraphFlags,
    traceables: IndexSet,
    nodes: Vec<CallgraphNode<A>>,
    summaries: Vec<SymbolSummary<A>>,
    by_symbol: HashMap<Arc<Symbol>, usize>,
    unwindable: Arc<Symbol>,
    height: usize,
}

impl<A: Default + Send + 'static> Callgraph<A> {
    /// Build a callgraph from the traceables at `traceables` on a blocking
    /// worker. The document reports busy while this runs.
    ///
    /// # Errors
    /// [`CallgraphError::Cancelled`] if `cancel` fires before the last
    /// traceable was added.
    pub async fn build(
        document: Arc<Document>,
        flags: CallgraphFlags,
        traceables: IndexSet,
        augment: Option<Arc<AugmentFn<A>>>,
        cancel: CancellationToken,
    ) -> Result<Self, CallgraphError> {
        tokio::task::spawn_blocking(move || {
            let _busy = document.busy_guard();
            Self::build_blocking(Arc::clone(&document), flags, traceables, augment.as_deref(), &cancel)
        })
        .await?
    }

    /// Synchronous body of [`build`](Self::build).
    ///
    /// # Errors
    /// [`CallgraphError::Cancelled`] if `cancel` fires.
    pub fn build_blocking(
        document: Arc<Document>,
        flags: CallgraphFlags,
        traceables: IndexSet,
        augment: Option<&AugmentFn<A>>,
        cancel: &CancellationToken,
    ) -> Result<Self, CallgraphError> {
        let mut graph = Self::new(Arc::clone(&document), flags, traceables);
        let list = document.list_traceables_at(&graph.traceables);
        let kernel_switch = document.symbols().context_switch(AddressContext::Kernel).cloned();

        for traceable in list.iter() {
            if cancel.is_cancelled() {
                return Err(CallgraphError::Cancelled);
            }
            let Some(leaf) = graph.add_traceable(&traceable, kernel_switch.as_ref()) else {
                continue;
            };
            if let Some(augment) = augment {
                augment(&mut graph, leaf, &traceable);
            }
        }

        graph.sort_children();
        info!(
            "Built callgraph from {} traceables: {} nodes, {} symbols, height {}",
            list.len(),
            graph.nodes.len(),
            graph.summaries.len(),
            graph.height
        );
        Ok(graph)
    }

    fn new(document: Arc<Document>, flags: CallgraphFlags, traceables: IndexSet) -> Self {
        let root = Symbol::new("All Processes", SymbolKind::Root).into_shared();
        let mut graph = Self {
            document,
            flags,
            traceables,
            nodes: Vec::new(),
            summaries: Vec::new(),
            by_symbol: HashMap::new(),
            unwindable: Symbol::new("Unwindable", SymbolKind::Unwindable).into_shared(),
            height: 0,
        };
        let summary = graph.summary_for(&root);
        graph.nodes.push(CallgraphNode {
            symbol: root,
            summary,
            parent: None,
            children: Vec::new(),
            count: 0,
            is_toplevel: false,
            augment: A::default(),
        });
        graph
    }
}

impl<A: Default> Callgraph<A> {
    fn summary_for(&mut self, symbol: &Arc<Symbol>) -> usize {
        if let Some(&index) = self.by_symbol.get(symbol.as_ref()) {
            return index;
        }
        let index = self.summaries.len();
        self.summaries.push(SymbolSummary {
            symbol: Arc::clone(symbol),
            callers: Vec::new(),
            traceables: IndexSet::new(),
            augment: A::default(),
        });
        self.by_symbol.insert(Arc::clone(symbol), index);
        index
    }

    /// Symbol chain for one traceable, innermost first and root last.
    fn stack_symbols(
        &self,
        traceable: &Traceable<'_>,
        kernel_switch: Option<&Arc<Symbol>>,
    ) -> Option<Vec<Arc<Symbol>>> {
        let document = &self.document;
        let flags = self.flags;
        let pid = traceable.pid();

        if pid == Pid(0) && flags.contains(CallgraphFlags::IGNORE_PROCESS_0) {
            return None;
        }
        let process = document.process_symbol(pid, flags.contains(CallgraphFlags::MERGE_SIMILAR_PROCESSES));
        if process.is_kernel_process() && flags.contains(CallgraphFlags::IGNORE_KERNEL_PROCESSES) {
            return None;
        }

        let depth = traceable.stack_depth();
        if depth == 0 || depth > wire::MAX_STACK_DEPTH {
            return None;
        }

        let (mut symbols, final_context) = document.symbolize_traceable(traceable, depth);
        if symbols.is_empty() {
            return None;
        }

        // A lone user marker means the unwind captured nothing useful.
        if symbols.len() == 1 && symbols[0].is_context_switch() && final_context == AddressContext::User {
            symbols[0] = Arc::clone(&self.unwindable);
        }
        if final_context == AddressContext::Kernel {
            symbols.extend(kernel_switch.cloned());
        }
        if symbols[0].is_context_switch() {
            symbols.remove(0);
        }
        if flags.contains(CallgraphFlags::BOTTOM_UP) {
            symbols.reverse();
        }
        if flags.contains(CallgraphFlags::INCLUDE_THREADS) {
            symbols.push(document.thread_symbol(pid, traceable.thread_id()));
        }
        symbols.push(process);
        symbols.push(Arc::clone(&self.nodes[NodeId::ROOT.0].symbol));
        Some(symbols)
    }

    fn add_traceable(&mut self, traceable: &Traceable<'_>, kernel_switch: Option<&Arc<Symbol>>) -> Option<NodeId> {
        let symbols = self.stack_symbols(traceable, kernel_switch)?;
        self.height = self.height.max(symbols.len());
        let leaf = self.add_trace(&symbols, traceable.position());
        self.nodes[leaf.0].is_toplevel = true;
        Some(leaf)
    }

    /// Merge one symbol chain (root last) into the tree and return the node
    /// it ended at.
    fn add_trace(&mut self, symbols: &[Arc<Symbol>], position: u32) -> NodeId {
        let hide_system = self.flags.contains(CallgraphFlags::HIDE_SYSTEM_LIBRARIES);
        let mut parent = NodeId::ROOT;
        self.nodes[parent.0].count += 1;

        let below_root = symbols.len().saturating_sub(1);
        for symbol in symbols[..below_root].iter().rev() {
            if hide_system && symbol.is_system_library() {
                continue;
            }
            let existing = self.nodes[parent.0]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].symbol.as_ref() == symbol.as_ref());
            parent = match existing {
                Some(child) => {
                    self.nodes[child.0].count += 1;
                    child
                }
                None => self.push_child(parent, symbol),
            };
        }

        self.populate_callers(parent, position);
        parent
    }

    fn push_child(&mut self, parent: NodeId, symbol: &Arc<Symbol>) -> NodeId {
        let summary = self.summary_for(symbol);
        let id = NodeId(self.nodes.len());
        self.nodes.push(CallgraphNode {
            symbol: Arc::clone(symbol),
            summary,
            parent: Some(parent),
            children: Vec::new(),
            count: 1,
            is_toplevel: false,
            augment: A::default(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn populate_callers(&mut self, leaf: NodeId, position: u32) {
        let mut at = Some(leaf);
        while let Some(id) = at {
            let node = &self.nodes[id.0];
            let (summary, parent) = (node.summary, node.parent);
            self.summaries[summary].traceables.insert(position);

            if let Some(parent) = parent {
                let caller = &self.nodes[parent.0].symbol;
                let callers = &mut self.summaries[summary].callers;
                if !matches!(caller.kind(), SymbolKind::Process | SymbolKind::Root)
                    && !callers.iter().any(|c| c == caller)
                {
                    callers.push(Arc::clone(caller));
                }
            }
            at = parent;
        }
    }

    fn sort_children(&mut self) {
        let left_heavy = self.flags.contains(CallgraphFlags::LEFT_HEAVY);
        for i in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[i].children);
            if left_heavy {
                children.sort_by_key(|c| std::cmp::Reverse(self.nodes[c.0].count));
            } else {
                children.sort_by(|a, b| self.nodes[a.0].symbol.name().cmp(self.nodes[b.0].symbol.name()));
            }
            self.nodes[i].children = children;
        }
        debug!("Sorted callgraph children ({})", if left_heavy { "by count" } else { "by name" });
    }
}

impl<A> Callgraph<A> {
    #[must_use]
    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    #[must_use]
    pub fn flags(&self) -> CallgraphFlags {
        self.flags
    }

    #[must_use]
    pub fn root(&self) -> &CallgraphNode<A> {
        &self.nodes[NodeId::ROOT.0]
    }

    /// # Panics
    /// If `id` did not come from this callgraph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &CallgraphNode<A> {
        &self.nodes[id.0]
    }

    /// Number of nodes, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root().children.is_empty()
    }

    /// Longest symbol chain added, counting thread, process and root.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `id` followed by each of its parents up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |id| self.nodes[id.0].parent)
    }

    /// Child of `parent` whose symbol is named `name`.
    #[must_use]
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0].children.iter().copied().find(|c| self.nodes[c.0].symbol.name() == name)
    }

    pub fn augment_mut(&mut self, id: NodeId) -> &mut A {
        &mut self.nodes[id.0].augment
    }

    /// Augmentation shared by every node with the same symbol as `id`.
    #[must_use]
    pub fn summary_augment(&self, id: NodeId) -> &A {
        &self.summaries[self.nodes[id.0].summary].augment
    }

    pub fn summary_augment_mut(&mut self, id: NodeId) -> &mut A {
        let summary = self.nodes[id.0].summary;
        &mut self.summaries[summary].augment
    }

    #[must_use]
    pub fn symbol_augment(&self, symbol: &Symbol) -> Option<&A> {
        self.summary(symbol).map(|s| &s.augment)
    }

    #[must_use]
    pub fn summary(&self, symbol: &Symbol) -> Option<&SymbolSummary<A>> {
        self.by_symbol.get(symbol).map(|&i| &self.summaries[i])
    }

    /// Every distinct symbol in the tree, in order of first appearance.
    #[must_use]
    pub fn list_symbols(&self) -> &[SymbolSummary<A>] {
        &self.summaries
    }

    /// Symbols seen directly above `symbol` in some stack.
    #[must_use]
    pub fn list_callers(&self, symbol: &Symbol) -> &[Arc<Symbol>] {
        self.summary(symbol).map_or(&[][..], |s| s.callers.as_slice())
    }

    /// The traceables this callgraph was built from.
    #[must_use]
    pub fn list_traceables(&self) -> FrameList<'_, Traceable<'_>> {
        self.document.list_traceables_at(&self.traceables)
    }

    /// Traceables whose stacks contain `symbol`.
    #[must_use]
    pub fn list_traceables_for_symbol(&self, symbol: &Symbol) -> FrameList<'_, Traceable<'_>> {
        match self.summary(symbol) {
            Some(summary) => self.document.list_traceables_at(&summary.traceables),
            None => self.document.list_traceables_at(&IndexSet::new()),
        }
    }

    /// Traceables whose stacks contain a symbol whose name matches the glob
    /// `pattern` (`*` and `?` wildcards). An empty pattern matches all.
    #[must_use]
    pub fn list_traceables_for_symbols_matching(&self, pattern: &str) -> FrameList<'_, Traceable<'_>> {
        if pattern.is_empty() {
            return self.list_traceables();
        }
        let mut positions = IndexSet::new();
        if let Some(regex) = glob_regex(pattern) {
            for summary in self.summaries.iter().filter(|s| regex.is_match(s.symbol.name())) {
                positions = positions.union(&summary.traceables);
            }
        }
        self.document.list_traceables_at(&positions)
    }
}

impl<A> std::fmt::Debug for Callgraph<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callgraph")
            .field("flags", &self.flags)
            .field("nodes", &self.nodes.len())
            .field("symbols", &self.summaries.len())
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Anchored regex equivalent of a `*`/`?` glob.
fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}
