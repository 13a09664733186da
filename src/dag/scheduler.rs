// src/dag/scheduler.rs

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt, Shared, try_join_all};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::errors::{FetchdagError, Result};
use crate::source::{FetchResult, Provider};
use crate::types::{Options, Records, SOURCE_OPTION_KEY, SourceName};

/// Providers keyed by the source name they serve.
pub type ProviderMap = HashMap<SourceName, Arc<dyn Provider>>;

type NodeTask = Shared<BoxFuture<'static, FetchResult>>;

/// Outcome of a scheduling call.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Result of the last source in topological order.
    Consolidated(Records),
    /// Every source's result, in topological order.
    All(Vec<Records>),
}

impl Resolved {
    /// The consolidated records, or the last entry of an `All` result.
    pub fn into_last(self) -> Records {
        match self {
            Resolved::Consolidated(records) => records,
            Resolved::All(mut all) => all.pop().unwrap_or_default(),
        }
    }

    pub fn into_all(self) -> Vec<Records> {
        match self {
            Resolved::Consolidated(records) => vec![records],
            Resolved::All(all) => all,
        }
    }
}

/// A validated graph plus its execution order.
///
/// Computed once per scheduling call; constructing it performs all the
/// checks that must fail before any fetch starts.
#[derive(Debug, Clone)]
pub struct Scheduler {
    graph: DagGraph,
    order: Vec<SourceName>,
}

impl Scheduler {
    /// Parse, build and order the declarations.
    pub fn from_declarations<S: AsRef<str>>(declarations: &[S]) -> Result<Self> {
        let graph = DagGraph::from_strs(declarations)?;
        Self::from_graph(graph)
    }

    pub fn from_graph(graph: DagGraph) -> Result<Self> {
        let order = graph.topological_order()?;
        Ok(Self { graph, order })
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Sources in execution order.
    pub fn order(&self) -> &[SourceName] {
        &self.order
    }

    /// Check that every source in the graph has a provider.
    pub fn check_providers(&self, providers: &ProviderMap) -> Result<()> {
        match self.order.iter().find(|name| !providers.contains_key(*name)) {
            Some(missing) => Err(FetchdagError::MissingProvider(missing.clone())),
            None => Ok(()),
        }
    }

    /// Run every source once, each as soon as its prerequisites settle.
    ///
    /// Independent sources run concurrently. Each task is spawned onto the
    /// runtime so it runs to completion even when the overall join has
    /// already failed on another branch.
    pub async fn run(
        &self,
        shared_options: &Options,
        providers: &ProviderMap,
        consolidate: bool,
    ) -> Result<Resolved> {
        if self.order.is_empty() {
            debug!("no sources declared; nothing to fetch");
            return Ok(empty(consolidate));
        }

        self.check_providers(providers)?;

        info!(order = ?self.order, consolidate, "resolving sources");

        let mut tasks: HashMap<&str, NodeTask> = HashMap::with_capacity(self.order.len());
        let mut ordered: Vec<NodeTask> = Vec::with_capacity(self.order.len());

        for name in &self.order {
            let provider = providers
                .get(name)
                .cloned()
                .ok_or_else(|| FetchdagError::MissingProvider(name.clone()))?;

            let prerequisites = self
                .graph
                .dependencies_of(name)
                .iter()
                .map(|dep| {
                    tasks.get(dep.as_str()).cloned().ok_or_else(|| {
                        FetchdagError::Other(anyhow!(
                            "prerequisite '{dep}' of '{name}' was not scheduled before it"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            // Per-node copy: a provider mutating its options cannot leak
            // into a sibling's request.
            let mut options = shared_options.clone();
            options.insert(SOURCE_OPTION_KEY.to_string(), Value::String(name.clone()));

            let task = node_task(name.clone(), provider, options, prerequisites);
            tokio::spawn(task.clone());

            tasks.insert(name.as_str(), task.clone());
            ordered.push(task);
        }

        let mut results = try_join_all(ordered).await?;

        info!(sources = results.len(), "all sources settled");

        if consolidate {
            Ok(Resolved::Consolidated(results.pop().unwrap_or_default()))
        } else {
            Ok(Resolved::All(results))
        }
    }
}

fn node_task(
    name: SourceName,
    provider: Arc<dyn Provider>,
    options: Options,
    prerequisites: Vec<NodeTask>,
) -> NodeTask {
    async move {
        let prior = match try_join_all(prerequisites).await {
            Ok(prior) => prior,
            Err(err) => {
                debug!(source = %name, error = %err, "prerequisite failed; skipping fetch");
                return Err(err);
            }
        };

        debug!(source = %name, prerequisites = prior.len(), "fetching");
        let result = provider.fetch(options, prior).await;

        match &result {
            Ok(records) => debug!(source = %name, records = records.len(), "source settled"),
            Err(err) => warn!(source = %name, error = %err, "source failed"),
        }
        result
    }
    .boxed()
    .shared()
}

fn empty(consolidate: bool) -> Resolved {
    if consolidate {
        Resolved::Consolidated(Vec::new())
    } else {
        Resolved::All(Vec::new())
    }
}

/// Resolve `declarations` against `providers` in one call.
///
/// Declaration, cycle and missing-provider errors are returned before any
/// provider is invoked. With `consolidate` the result is the value of the
/// last source in topological order, which is not necessarily the source
/// declared last.
pub async fn resolve<S: AsRef<str>>(
    shared_options: &Options,
    providers: &ProviderMap,
    declarations: &[S],
    consolidate: bool,
) -> Result<Resolved> {
    let scheduler = Scheduler::from_declarations(declarations)?;
    scheduler.run(shared_options, providers, consolidate).await
}
