//! # Decode Graph
//!
//! Compiles bit-pattern tables into a flat arena of [`CompiledNode`]s and
//! walks it. Names are resolved once, at build time: every named node is
//! compiled at most once and shared by id, so the arena holds one entry per
//! reachable table (fewer with the optimizer on) plus one per category.
//!
//! ```text
//!   Root ──0b1000──▶ DataProcessingImmediate ──0b010──▶ Leaf(AddSubImmediate)
//!     │                         │
//!     └──0b1010──▶ ...          └──0b101──▶ MoveWideClass ──▶ Leaf(MoveWide)
//!                                                         └─▶ Leaf(Unallocated)
//! ```
//!
//! A built graph is immutable, so it is `Send + Sync` and can be shared
//! between threads through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::a64_tables::{self, A64_ROOT, C64_ROOT};
use super::category::{Category, Isa};
use super::compiled::{CompiledNode, Lowered, NodeId};
use super::node::{DecodeNode, NodeKind, matching_slots};
use super::table::{DecodePattern, TableError};

static BOOTSTRAP: Lazy<Arc<DecodeGraph>> = Lazy::new(|| Arc::new(DecodeGraph::a64()));

#[derive(Debug)]
pub struct DecodeGraph {
    nodes: Vec<CompiledNode>,
    roots: [NodeId; Isa::ALL.len()],
}

impl DecodeGraph {
    #[must_use]
    pub fn builder(tables: &[DecodePattern]) -> DecodeGraphBuilder<'_> {
        DecodeGraphBuilder {
            tables,
            roots: Vec::new(),
            optimize: true,
        }
    }

    /// Builds the bootstrap A64/C64 graph.
    ///
    /// # Panics
    /// If the bootstrap tables are malformed.
    #[must_use]
    pub fn a64() -> Self {
        Self::builder(a64_tables::TABLES)
            .root(Isa::A64, A64_ROOT)
            .root(Isa::C64, C64_ROOT)
            .build()
            .unwrap_or_else(|e| panic!("bootstrap decode tables are malformed: {e}"))
    }

    /// The process-wide bootstrap graph, built on first use.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&BOOTSTRAP)
    }

    pub fn classify(&self, word: u32, isa: Isa) -> Category {
        let mut id = self.root(isa);
        loop {
            let node = &self.nodes[id.index()];
            match node.next(word) {
                Some(next) => id = next,
                None => {
                    return node
                        .category()
                        .unwrap_or_else(|| unreachable!("only leaves stop the walk"));
                }
            }
        }
    }

    #[must_use]
    pub const fn root(&self, isa: Isa) -> NodeId {
        self.roots[isa.index()]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

pub struct DecodeGraphBuilder<'t> {
    tables: &'t [DecodePattern],
    roots: Vec<(Isa, &'static str)>,
    optimize: bool,
}

impl DecodeGraphBuilder<'_> {
    /// Registers the root node for `isa`. Variants without a root fall back
    /// to the [`Isa::A64`] root.
    #[must_use]
    pub fn root(mut self, isa: Isa, name: &'static str) -> Self {
        self.roots.retain(|(registered, _)| *registered != isa);
        self.roots.push((isa, name));
        self
    }

    #[must_use]
    pub const fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn build(self) -> Result<DecodeGraph, TableError> {
        let mut nodes: HashMap<&'static str, DecodeNode> = Category::ALL
            .iter()
            .map(|&category| (category.name(), DecodeNode::leaf(category)))
            .collect();

        for entry in self.tables {
            let node = DecodeNode::from_pattern(entry)?;
            if nodes.insert(entry.name, node).is_some() {
                return Err(TableError::DuplicateNode { node: entry.name });
            }
        }

        // Every target must resolve, reachable or not.
        for entry in self.tables {
            for &(_, target) in entry.mapping {
                if !nodes.contains_key(target) {
                    return Err(TableError::UnknownTarget {
                        node: entry.name,
                        target,
                    });
                }
            }
        }

        let mut compiler = Compiler {
            nodes: &nodes,
            arena: Vec::new(),
            state: HashMap::new(),
            optimize: self.optimize,
        };

        let base = self
            .roots
            .iter()
            .find(|(isa, _)| *isa == Isa::A64)
            .map(|&(_, name)| name)
            .ok_or(TableError::MissingBaseRoot)?;

        let mut roots = [NodeId::new(0); Isa::ALL.len()];
        for isa in Isa::ALL {
            let name = self
                .roots
                .iter()
                .find(|(registered, _)| *registered == isa)
                .map_or(base, |&(_, name)| name);
            if !nodes.contains_key(name) {
                return Err(TableError::UnknownRoot { node: name });
            }
            roots[isa.index()] = compiler.compile(name)?;
        }

        tracing::debug!(
            tables = self.tables.len(),
            nodes = compiler.arena.len(),
            optimize = self.optimize,
            "decode graph built"
        );

        Ok(DecodeGraph {
            nodes: compiler.arena,
            roots,
        })
    }
}

enum CompileState {
    InProgress,
    Done(NodeId),
}

struct Compiler<'n> {
    nodes: &'n HashMap<&'static str, DecodeNode>,
    arena: Vec<CompiledNode>,
    state: HashMap<&'static str, CompileState>,
    optimize: bool,
}

impl Compiler<'_> {
    fn compile(&mut self, name: &'static str) -> Result<NodeId, TableError> {
        match self.state.get(name) {
            Some(CompileState::Done(id)) => return Ok(*id),
            Some(CompileState::InProgress) => return Err(TableError::Cycle { node: name }),
            None => {}
        }

        let nodes = self.nodes;
        let node = &nodes[name];
        let id = match &node.kind {
            NodeKind::Leaf(category) => self.push(CompiledNode::Leaf(*category)),
            NodeKind::Interior {
                sampled_mask,
                width,
                patterns,
                otherwise,
            } => {
                self.state.insert(name, CompileState::InProgress);

                let mut slots: Vec<Option<NodeId>> = vec![None; 1 << *width];
                for pattern in patterns {
                    let child = self.compile(pattern.target)?;
                    for index in matching_slots(pattern.mask, pattern.value, *width) {
                        slots[index].get_or_insert(child);
                    }
                }
                if let Some(otherwise) = *otherwise {
                    if slots.iter().any(Option::is_none) {
                        let child = self.compile(otherwise)?;
                        for slot in &mut slots {
                            slot.get_or_insert(child);
                        }
                    }
                }

                let children = slots
                    .into_iter()
                    .enumerate()
                    .map(|(index, slot)| {
                        slot.ok_or_else(|| TableError::UnmappedSlot { node: name, index })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                match CompiledNode::lower(*sampled_mask, children, self.optimize) {
                    Lowered::Forward(child) => child,
                    Lowered::Node(compiled) => self.push(compiled),
                }
            }
        };

        self.state.insert(name, CompileState::Done(id));
        Ok(id)
    }

    fn push(&mut self, node: CompiledNode) -> NodeId {
        let id = NodeId::new(self.arena.len());
        self.arena.push(node);
        id
    }
}
