// src/dag/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::ResourceGraph;
use crate::dag::scheduler::MaterializeOptions;
use crate::errors::{Result, StatecraftError};
use crate::types::ResourceId;

impl ResourceGraph {
    /// Check the graph with the default [`MaterializeOptions`].
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&MaterializeOptions::default())
    }

    /// Structural checks run before materialization.
    ///
    /// Edges whose endpoints are not members are always rejected; a task for
    /// such an endpoint would never run and its dependents would wait
    /// forever. Name uniqueness and cycle detection follow `options`.
    pub fn validate_with(&self, options: &MaterializeOptions) -> Result<()> {
        if options.reject_duplicate_names {
            self.check_unique_names()?;
        }
        self.check_endpoints()?;
        if options.detect_cycles {
            self.check_acyclic()?;
        }
        Ok(())
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for member in self.members() {
            if !seen.insert(member.name.as_str()) {
                return Err(StatecraftError::DuplicateName(member.name.clone()));
            }
        }
        Ok(())
    }

    fn check_endpoints(&self) -> Result<()> {
        let known: HashSet<ResourceId> = self.resources().collect();
        for (from, tos) in self.adjacency() {
            for to in tos.keys() {
                for id in [from, to] {
                    if !known.contains(id) {
                        return Err(StatecraftError::UnknownResource(format!(
                            "{} (edge {} -> {})",
                            id,
                            self.describe(*from),
                            self.describe(*to)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        // Edge direction: upstream -> dependent.
        let mut graph: DiGraphMap<ResourceId, ()> = DiGraphMap::new();
        for id in self.resources() {
            graph.add_node(id);
        }
        for (from, tos) in self.adjacency() {
            for to in tos.keys() {
                graph.add_edge(*from, *to, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => Err(StatecraftError::DagCycle(format!(
                "cycle detected in resource graph involving resource '{}'",
                self.describe(cycle.node_id())
            ))),
        }
    }
}
