// src/dag/setter.rs

use crate::dag::graph::ResourceGraph;
use crate::resource::Resource;
use crate::signal::Signal;
use crate::types::ResourceId;

/// Accumulates `(source, signal)` requirements and commits them to whatever
/// resource [`do_`](Self::do_) registers.
///
/// ```no_run
/// # use statecraft::{ResourceGraph, Signal};
/// # use statecraft::resources::CmdResource;
/// let mut rg = ResourceGraph::new();
/// let unit = rg.register("unit", CmdResource::new("true"));
/// let cfg = rg.register("cfg", CmdResource::new("true"));
/// rg.when(unit, &[Signal::Materialized])
///     .and(cfg, &[])
///     .do_("restart", CmdResource::new("systemctl").arg("restart").arg("app"));
/// ```
#[must_use = "requirements are only recorded once `do_` is called"]
pub struct DependencySetter<'g> {
    graph: &'g mut ResourceGraph,
    pending: Vec<(ResourceId, Signal)>,
}

impl<'g> DependencySetter<'g> {
    pub(crate) fn new(graph: &'g mut ResourceGraph, source: ResourceId, signals: &[Signal]) -> Self {
        let mut setter = Self {
            graph,
            pending: Vec::new(),
        };
        setter.push(source, signals);
        setter
    }

    /// Also require `signals` from `source`. An empty slice means
    /// [`Signal::Finished`].
    pub fn and(mut self, source: ResourceId, signals: &[Signal]) -> Self {
        self.push(source, signals);
        self
    }

    /// Register `target` under `name` and make it depend on every pending
    /// requirement.
    ///
    /// Takes `&mut self` so the same requirements can gate several targets.
    pub fn do_<R: Resource>(&mut self, name: impl Into<String>, target: R) -> ResourceId {
        let to = self.graph.register(name, target);
        for &(from, signal) in &self.pending {
            self.graph.register_dependency(from, signal, to);
        }
        to
    }

    fn push(&mut self, source: ResourceId, signals: &[Signal]) {
        if signals.is_empty() {
            self.pending.push((source, Signal::Finished));
        } else {
            self.pending
                .extend(signals.iter().map(|&signal| (source, signal)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::resource::BoxFuture;

    struct Noop;

    impl Resource for Noop {
        fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn empty_signal_list_defaults_to_finished() {
        let mut rg = ResourceGraph::new();
        let a = rg.register("a", Noop);
        let b = rg.when(a, &[]).do_("b", Noop);

        assert_eq!(rg.signals_between(a, b), Some(&[Signal::Finished][..]));
    }

    #[test]
    fn and_accumulates_across_sources() {
        let mut rg = ResourceGraph::new();
        let a = rg.register("a", Noop);
        let b = rg.register("b", Noop);
        let c = rg
            .when(a, &[Signal::Materialized, Signal::Evaluated])
            .and(b, &[Signal::Skipped])
            .do_("c", Noop);

        assert_eq!(
            rg.signals_between(a, c),
            Some(&[Signal::Materialized, Signal::Evaluated][..])
        );
        assert_eq!(rg.signals_between(b, c), Some(&[Signal::Skipped][..]));
        assert_eq!(rg.dependencies_of(c), vec![a, b]);
    }

    #[test]
    fn one_setter_gates_several_targets() {
        let mut rg = ResourceGraph::new();
        let a = rg.register("a", Noop);
        let mut gate = rg.when(a, &[Signal::Evaluated]);
        let b = gate.do_("b", Noop);
        let c = gate.do_("c", Noop);

        assert_eq!(rg.dependents_of(a), vec![b, c]);
    }
}
