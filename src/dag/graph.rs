// src/dag/graph.rs

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::Context;
use crate::dag::scheduler::MaterializeOptions;
use crate::dag::setter::DependencySetter;
use crate::resource::{BoxFuture, Resource};
use crate::signal::Signal;
use crate::types::{ResourceId, prefixed};

/// `from -> {to -> required signals}` (or the mirror image).
pub(crate) type Adjacency = BTreeMap<ResourceId, BTreeMap<ResourceId, Vec<Signal>>>;

/// A registered leaf resource.
pub(crate) struct Member {
    pub(crate) id: ResourceId,
    pub(crate) name: String,
    pub(crate) resource: Arc<dyn Resource>,
}

/// Bookkeeping for a graph that was flattened into this one, so its handle
/// can still be used as an edge endpoint.
#[derive(Debug, Clone)]
struct Group {
    name: String,
    members: Vec<ResourceId>,
    /// Members without inbound edges inside the flattened graph.
    roots: Vec<ResourceId>,
    /// Members without outbound edges inside the flattened graph.
    leaves: Vec<ResourceId>,
}

/// A set of resources and the signal-gated edges between them.
///
/// A `ResourceGraph` is itself a [`Resource`], so graphs compose: registering
/// a graph into another one moves all of its members and edges into the
/// parent (flattening) and leaves the registered value empty. Nesting only
/// survives in member names, which are prefixed with the registration name
/// of every enclosing graph (`outer·inner·file`).
///
/// Both adjacency maps are only ever written together, so every edge carries
/// the same signal list in each direction.
#[derive(Default)]
pub struct ResourceGraph {
    members: Vec<Member>,
    index: HashMap<ResourceId, usize>,
    dependencies: Adjacency,
    inverse_dependencies: Adjacency,
    groups: HashMap<ResourceId, Group>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under `name` and return its handle.
    ///
    /// If `resource` is itself a `ResourceGraph` it is flattened: its members
    /// and edges are merged into `self`, their names are prefixed with
    /// `name`, and the returned handle refers to the flattened graph as a
    /// whole (its roots when used as a dependent, its leaves when used as a
    /// dependency). A `Box<ResourceGraph>` is flattened the same way. A graph
    /// hidden behind `Box<dyn Resource>` cannot be recognised and is kept as a
    /// single opaque member that runs its own nested materialization.
    pub fn register<R: Resource>(&mut self, name: impl Into<String>, mut resource: R) -> ResourceId {
        let name = name.into();
        let any = &mut resource as &mut dyn Any;
        if let Some(graph) = any.downcast_mut::<ResourceGraph>() {
            let child = std::mem::take(graph);
            return self.absorb(name, child);
        }
        if let Some(boxed) = any.downcast_mut::<Box<ResourceGraph>>() {
            let child = std::mem::take(&mut **boxed);
            return self.absorb(name, child);
        }

        let id = ResourceId::next();
        debug!(resource = %name, %id, "registering resource");
        self.insert_member(Member {
            id,
            name,
            resource: Arc::new(resource),
        });
        id
    }

    /// Add the requirement that `to` observes `signal` from `from` before it
    /// is evaluated.
    ///
    /// A flattened graph used as `from` stands for its leaves; used as `to`,
    /// for its roots.
    pub fn register_dependency(&mut self, from: ResourceId, signal: Signal, to: ResourceId) {
        let froms = self.expand(from, |group| &group.leaves);
        let tos = self.expand(to, |group| &group.roots);

        if froms.is_empty() || tos.is_empty() {
            warn!(
                from = %self.describe(from),
                to = %self.describe(to),
                %signal,
                "dependency endpoint is an empty graph; no edge added"
            );
        }

        for from in &froms {
            for to in &tos {
                self.dependencies
                    .entry(*from)
                    .or_default()
                    .entry(*to)
                    .or_default()
                    .push(signal);
                self.inverse_dependencies
                    .entry(*to)
                    .or_default()
                    .entry(*from)
                    .or_default()
                    .push(signal);
            }
        }
    }

    /// Start declaring dependencies on `resource`.
    ///
    /// With an empty `signals` slice the requirement is [`Signal::Finished`]:
    /// wait until `resource` is done, whatever the outcome.
    pub fn when(&mut self, resource: ResourceId, signals: &[Signal]) -> DependencySetter<'_> {
        DependencySetter::new(self, resource, signals)
    }

    /// Number of leaf resources.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `id` is a member or a flattened graph of this graph.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.index.contains_key(&id) || self.groups.contains_key(&id)
    }

    /// Full (prefixed) name of a member or flattened graph.
    pub fn name_of(&self, id: ResourceId) -> Option<&str> {
        if let Some(&pos) = self.index.get(&id) {
            return Some(self.members[pos].name.as_str());
        }
        self.groups.get(&id).map(|group| group.name.as_str())
    }

    /// Leaf resource handles in registration order.
    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.members.iter().map(|m| m.id)
    }

    /// Members of a flattened graph, in the order they were registered.
    pub fn members_of(&self, group: ResourceId) -> Option<&[ResourceId]> {
        self.groups.get(&group).map(|g| g.members.as_slice())
    }

    /// Signals `to` requires from `from`, if there is such an edge.
    pub fn signals_between(&self, from: ResourceId, to: ResourceId) -> Option<&[Signal]> {
        self.dependencies
            .get(&from)
            .and_then(|tos| tos.get(&to))
            .map(Vec::as_slice)
    }

    /// Resources `id` waits on.
    pub fn dependencies_of(&self, id: ResourceId) -> Vec<ResourceId> {
        self.inverse_dependencies
            .get(&id)
            .map(|froms| froms.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Resources waiting on `id`.
    pub fn dependents_of(&self, id: ResourceId) -> Vec<ResourceId> {
        self.dependencies
            .get(&id)
            .map(|tos| tos.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Members with no inbound edges.
    pub fn roots(&self) -> Vec<ResourceId> {
        self.resources()
            .filter(|id| !self.inverse_dependencies.contains_key(id))
            .collect()
    }

    /// Members with no outbound edges.
    pub fn leaves(&self) -> Vec<ResourceId> {
        self.resources()
            .filter(|id| !self.dependencies.contains_key(id))
            .collect()
    }

    pub(crate) fn members(&self) -> &[Member] {
        &self.members
    }

    pub(crate) fn adjacency(&self) -> &Adjacency {
        &self.dependencies
    }

    /// Name for diagnostics, falling back to the raw handle.
    pub(crate) fn describe(&self, id: ResourceId) -> String {
        self.name_of(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    }

    fn insert_member(&mut self, member: Member) {
        self.index.insert(member.id, self.members.len());
        self.members.push(member);
    }

    fn expand(&self, id: ResourceId, pick: impl Fn(&Group) -> &Vec<ResourceId>) -> Vec<ResourceId> {
        match self.groups.get(&id) {
            Some(group) => pick(group).clone(),
            None => vec![id],
        }
    }

    /// Flatten `child` into `self` under `name`.
    fn absorb(&mut self, name: String, child: ResourceGraph) -> ResourceId {
        let id = ResourceId::next();
        debug!(
            graph = %name,
            %id,
            members = child.members.len(),
            "flattening resource graph"
        );

        let group = Group {
            name: name.clone(),
            members: child.resources().collect(),
            roots: child.roots(),
            leaves: child.leaves(),
        };

        let ResourceGraph {
            members,
            index: _,
            dependencies,
            inverse_dependencies,
            groups,
        } = child;

        for mut member in members {
            member.name = prefixed(&name, &member.name);
            self.insert_member(member);
        }
        merge_adjacency(&mut self.dependencies, dependencies);
        merge_adjacency(&mut self.inverse_dependencies, inverse_dependencies);
        for (nested_id, mut nested) in groups {
            nested.name = prefixed(&name, &nested.name);
            self.groups.insert(nested_id, nested);
        }
        self.groups.insert(id, group);
        id
    }
}

/// Merge `from` into `into`, concatenating signal lists of shared edges.
fn merge_adjacency(into: &mut Adjacency, from: Adjacency) {
    for (a, edges) in from {
        let target = into.entry(a).or_default();
        for (b, signals) in edges {
            target.entry(b).or_default().extend(signals);
        }
    }
}

impl Resource for ResourceGraph {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.materialize_with(ctx, &MaterializeOptions::default())
                .await
                .map_err(anyhow::Error::from)
        })
    }
}

impl fmt::Debug for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.members.iter().map(|m| m.name.as_str()).collect();
        f.debug_struct("ResourceGraph")
            .field("resources", &names)
            .field("dependencies", &self.dependencies)
            .field("groups", &self.groups.len())
            .finish()
    }
}

/// `ResourceGraph{rs:[a b c], deps:{a:b a:c}}`
impl fmt::Display for ResourceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.members.iter().map(|m| m.name.as_str()).collect();
        let mut edges = Vec::new();
        for member in &self.members {
            if let Some(tos) = self.dependencies.get(&member.id) {
                for to in tos.keys() {
                    edges.push(format!("{}:{}", member.name, self.describe(*to)));
                }
            }
        }
        write!(
            f,
            "ResourceGraph{{rs:[{}], deps:{{{}}}}}",
            names.join(" "),
            edges.join(" ")
        )
    }
}
