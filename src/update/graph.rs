//! A small, statically typed task graph.
//!
//! Nodes are async steps with declared inputs. Each node's output lands in a
//! typed [`Handle`]; downstream nodes list the handles they need and receive
//! the resolved values as a tuple. The scheduler starts a node as soon as all
//! of its dependencies have produced a value, runs independent nodes
//! concurrently, and stops starting new work as soon as any node halts.
//!
//! A node halts with [`Halt::Fail`] for a real error or [`Halt::Skip`] for an
//! early exit that is not an error. Both stop the graph the same way; only the
//! final [`GraphOutcome`] tells them apart.
//!
//! ```rust,no_run
//! use signed_launcher::update::{GraphError, GraphOutcome, Halt, TaskGraph};
//!
//! # async fn example() -> Result<(), GraphError> {
//! let mut graph = TaskGraph::<GraphError>::new();
//! let two = graph.add("two", (), |()| async { Ok(2) })?;
//! let three = graph.add("three", (), |()| async { Ok(3) })?;
//! let product = graph.add("product", (two, three), |(a, b): (i32, i32)| async move {
//!     if a * b == 0 { Err(Halt::Skip("nothing to do".into())) } else { Ok(a * b) }
//! })?;
//!
//! match graph.run().await {
//!     GraphOutcome::Completed => assert_eq!(product.get(), Some(&6)),
//!     GraphOutcome::Skipped { .. } | GraphOutcome::Failed { .. } => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{Instrument, debug, debug_span, trace};

static NEXT_GRAPH_ID: AtomicUsize = AtomicUsize::new(0);

/// Why a node stopped the graph.
#[derive(Debug)]
pub enum Halt<E> {
    /// Legitimate early exit. Not an error, but nothing downstream runs.
    Skip(String),
    /// A real failure.
    Fail(E),
}

impl<E> Halt<E> {
    /// Wrap anything convertible into the graph's error type.
    pub fn fail(error: impl Into<E>) -> Self {
        Self::Fail(error.into())
    }
}

impl<E> From<E> for Halt<E> {
    fn from(error: E) -> Self {
        Self::Fail(error)
    }
}

/// Structural problems with the graph itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{node}' depends on a handle from another graph")]
    ForeignHandle {
        node: &'static str,
    },

    #[error("task graph contains a cycle through '{node}'")]
    Cycle {
        node: &'static str,
    },

    #[error("node '{node}' started before its input '{input}' was available")]
    UnresolvedInput {
        node: &'static str,
        input: &'static str,
    },
}

/// How a graph run ended.
#[derive(Debug)]
pub enum GraphOutcome<E> {
    /// Every node produced a value.
    Completed,
    /// A node returned [`Halt::Skip`].
    Skipped {
        node: &'static str,
        reason: String,
    },
    /// A node returned [`Halt::Fail`].
    Failed {
        node: &'static str,
        error: E,
    },
}

/// Typed reference to a node's output.
///
/// Cloning a handle is cheap; all clones observe the same value.
pub struct Handle<T> {
    graph: usize,
    index: NodeIndex,
    name: &'static str,
    slot: Arc<OnceLock<T>>,
}

impl<T> Handle<T> {
    /// Name the node was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The node's value, once it has completed successfully.
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph,
            index: self.index,
            name: self.name,
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.name)
            .field("index", &self.index.index())
            .field("resolved", &self.slot.get().is_some())
            .finish()
    }
}

/// The declared inputs of a node: `()` or a tuple of [`Handle`]s.
pub trait Inputs: Send + 'static {
    /// Values handed to the step, one per handle.
    type Values: Send + 'static;

    #[doc(hidden)]
    fn dependencies(&self) -> Vec<(usize, NodeIndex)>;

    #[doc(hidden)]
    fn resolve(&self) -> Result<Self::Values, &'static str>;
}

impl Inputs for () {
    type Values = ();

    fn dependencies(&self) -> Vec<(usize, NodeIndex)> {
        Vec::new()
    }

    fn resolve(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

macro_rules! tuple_inputs {
    ($($ty:ident => $idx:tt),+) => {
        impl<$($ty),+> Inputs for ($(Handle<$ty>,)+)
        where
            $($ty: Clone + Send + Sync + 'static),+
        {
            type Values = ($($ty,)+);

            fn dependencies(&self) -> Vec<(usize, NodeIndex)> {
                vec![$((self.$idx.graph, self.$idx.index)),+]
            }

            fn resolve(&self) -> Result<Self::Values, &'static str> {
                Ok(($(self.$idx.get().cloned().ok_or(self.$idx.name)?,)+))
            }
        }
    };
}

tuple_inputs!(A => 0);
tuple_inputs!(A => 0, B => 1);
tuple_inputs!(A => 0, B => 1, C => 2);
tuple_inputs!(A => 0, B => 1, C => 2, D => 3);

type Job<E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), Halt<E>>> + Send>;

struct Node<E> {
    name: &'static str,
    job: Option<Job<E>>,
}

/// A dependency graph of async steps sharing the error type `E`.
///
/// Edges point from a dependency to its dependents.
pub struct TaskGraph<E> {
    id: usize,
    graph: DiGraph<Node<E>, ()>,
}

impl<E> Default for TaskGraph<E>
where
    E: From<GraphError> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TaskGraph<E>
where
    E: From<GraphError> + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            graph: DiGraph::new(),
        }
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Register `step` under `name`, to run once every handle in `inputs`
    /// holds a value.
    ///
    /// Inputs must be handles returned by this same graph; since a handle only
    /// exists after its node was added, the graph cannot contain cycles.
    pub fn add<I, T, F, Fut>(
        &mut self,
        name: &'static str,
        inputs: I,
        step: F,
    ) -> Result<Handle<T>, GraphError>
    where
        I: Inputs,
        T: Send + Sync + 'static,
        F: FnOnce(I::Values) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Halt<E>>> + Send + 'static,
    {
        let dependencies = inputs.dependencies();
        if dependencies.iter().any(|(graph, _)| *graph != self.id) {
            return Err(GraphError::ForeignHandle {
                node: name,
            });
        }

        let slot = Arc::new(OnceLock::new());
        let output = Arc::clone(&slot);
        let job: Job<E> = Box::new(move || {
            async move {
                let values = inputs.resolve().map_err(|input| {
                    Halt::Fail(E::from(GraphError::UnresolvedInput {
                        node: name,
                        input,
                    }))
                })?;
                let value = step(values).await?;
                // Jobs run once, so the slot is always empty here.
                let _ = output.set(value);
                Ok::<(), Halt<E>>(())
            }
            .boxed()
        });

        let index = self.graph.add_node(Node {
            name,
            job: Some(job),
        });
        for (_, dependency) in dependencies {
            self.graph.add_edge(dependency, index, ());
        }

        trace!(node = name, index = index.index(), "Registered node");
        Ok(Handle {
            graph: self.id,
            index,
            name,
            slot,
        })
    }

    /// Node names in a valid execution order.
    pub fn plan(&self) -> Result<Vec<&'static str>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|index| self.graph[index].name).collect())
            .map_err(|cycle| GraphError::Cycle {
                node: self.graph[cycle.node_id()].name,
            })
    }

    /// Execute the graph until every node completed or one of them halted.
    ///
    /// After a halt no further node is started. Nodes already running are
    /// driven to completion and their results discarded.
    pub async fn run(mut self) -> GraphOutcome<E> {
        match self.plan() {
            Ok(plan) => debug!(nodes = plan.len(), plan = ?plan, "Executing task graph"),
            Err(error) => {
                return GraphOutcome::Failed {
                    node: "<graph>",
                    error: E::from(error),
                };
            }
        }

        let mut pending: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| (index, self.graph.edges_directed(index, Direction::Incoming).count()))
            .collect();

        let mut running = FuturesUnordered::new();
        let ready: Vec<NodeIndex> =
            pending.iter().filter(|(_, count)| **count == 0).map(|(index, _)| *index).collect();
        for index in ready {
            if let Some(task) = self.start(index) {
                running.push(task);
            }
        }

        let mut halted: Option<(&'static str, Halt<E>)> = None;

        while let Some((index, result)) = running.next().await {
            let name = self.graph[index].name;
            match result {
                Ok(()) => {
                    trace!(node = name, "Node completed");
                    if halted.is_some() {
                        continue;
                    }
                    let dependents: Vec<NodeIndex> =
                        self.graph.neighbors_directed(index, Direction::Outgoing).collect();
                    for dependent in dependents {
                        let Some(count) = pending.get_mut(&dependent) else {
                            continue;
                        };
                        *count = count.saturating_sub(1);
                        if *count == 0
                            && let Some(task) = self.start(dependent)
                        {
                            running.push(task);
                        }
                    }
                }
                Err(halt) => {
                    if halted.is_none() {
                        debug!(node = name, "Node halted the graph");
                        halted = Some((name, halt));
                    } else {
                        debug!(node = name, "Discarding result of node after halt");
                    }
                }
            }
        }

        match halted {
            None => GraphOutcome::Completed,
            Some((node, Halt::Skip(reason))) => GraphOutcome::Skipped {
                node,
                reason,
            },
            Some((node, Halt::Fail(error))) => GraphOutcome::Failed {
                node,
                error,
            },
        }
    }

    /// Take the node's job and turn it into a running future. `None` if the
    /// node was already started.
    fn start(
        &mut self,
        index: NodeIndex,
    ) -> Option<BoxFuture<'static, (NodeIndex, Result<(), Halt<E>>)>> {
        let node = &mut self.graph[index];
        let job = node.job.take()?;
        let span = debug_span!("node", name = node.name);
        trace!(node = node.name, "Starting node");
        Some(job().instrument(span).map(move |result| (index, result)).boxed())
    }
}
