// src/dag/scheduler.rs

//! Concurrent materialization of a [`ResourceGraph`].
//!
//! Every member runs in its own Tokio task. Tasks never look at each other's
//! state: the only coordination is one bounded signal queue per edge and the
//! run's cancellation [`Context`].
//!
//! Per task:
//!
//! 1. wait on every inbound edge at once; an edge is *met* once each required
//!    signal was seen, *unmet* if `Finished` arrives first, and *abandoned*
//!    if the run is canceled or the upstream task went away;
//! 2. abandoned: return without emitting anything;
//! 3. unmet: emit `Unevaluated`, `Finished`;
//! 4. met: run the skip-check (if any), then either emit `Skipped` or
//!    materialize and emit `Materialized`, then `Evaluated`, `Finished`.
//!
//! A skip-check or materialization failure is fatal: the first one is kept as
//! the run's result and cancels the run context, which makes every pending
//! wait abandon.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::context::Context;
use crate::dag::graph::ResourceGraph;
use crate::errors::{Result, StatecraftError};
use crate::resource::Resource;
use crate::signal::{Signal, join_signals};
use crate::sync::lock;

/// Capacity of each per-edge signal queue.
///
/// A resource emits at most three signals per run, so senders never wait.
pub const EDGE_CAPACITY: usize = 4;

/// Knobs for a single [`ResourceGraph::materialize_with`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// Fail validation when two members share a (prefixed) name.
    pub reject_duplicate_names: bool,
    /// Fail validation when the edges form a cycle.
    pub detect_cycles: bool,
    /// Cancel the run after this long.
    pub timeout: Option<Duration>,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            reject_duplicate_names: true,
            detect_cycles: true,
            timeout: None,
        }
    }
}

impl ResourceGraph {
    /// Materialize every member with the default [`MaterializeOptions`].
    pub async fn materialize(&self, ctx: &Context) -> Result<()> {
        self.materialize_with(ctx, &MaterializeOptions::default())
            .await
    }

    /// Validate the graph, then evaluate every member concurrently.
    ///
    /// Returns once every resource task has ended. The result is the first
    /// fatal error, or [`StatecraftError::Cancelled`] when nothing failed but
    /// `ctx` (or the configured timeout) canceled the run.
    pub async fn materialize_with(&self, ctx: &Context, options: &MaterializeOptions) -> Result<()> {
        self.validate_with(options)?;

        let caller = match options.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };
        let run_ctx = caller.child();
        let failure = Arc::new(FirstFailure::new(run_ctx.clone()));

        let tasks = self.plan();
        info!(resources = tasks.len(), "materializing resource graph");
        let started = Instant::now();

        let mut set = JoinSet::new();
        for task in tasks {
            let span = info_span!("resource", name = %task.name);
            let ctx = run_ctx.for_resource(&task.name);
            set.spawn(task.run(ctx, Arc::clone(&failure)).instrument(span));
        }

        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                // Panics are reported by the task's own guard.
                debug!(error = %err, "resource task ended abnormally");
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(err) = failure.take() {
            warn!(elapsed_ms, error = %err, "materialization failed");
            return Err(err);
        }
        if caller.is_cancelled() {
            warn!(elapsed_ms, "materialization canceled");
            return Err(StatecraftError::Cancelled);
        }

        info!(elapsed_ms, "materialization complete");
        Ok(())
    }

    /// One task per member, wired with one queue per edge.
    fn plan(&self) -> Vec<ResourceTask> {
        let mut tasks: Vec<ResourceTask> = self
            .members()
            .iter()
            .map(|member| ResourceTask {
                name: member.name.clone(),
                resource: Arc::clone(&member.resource),
                inbound: Vec::new(),
                outbound: Emitter::default(),
            })
            .collect();
        let position: HashMap<_, _> = self
            .members()
            .iter()
            .enumerate()
            .map(|(pos, member)| (member.id, pos))
            .collect();

        for (from, tos) in self.adjacency() {
            for (to, signals) in tos {
                let (Some(&from_pos), Some(&to_pos)) = (position.get(from), position.get(to))
                else {
                    continue;
                };
                let (tx, rx) = mpsc::channel(EDGE_CAPACITY);
                tasks[from_pos].outbound.senders.push(tx);
                let upstream = tasks[from_pos].name.clone();
                tasks[to_pos].inbound.push(InboundEdge {
                    upstream,
                    required: signals.clone(),
                    rx,
                });
            }
        }
        tasks
    }
}

/// Write-once slot for the run's error.
struct FirstFailure {
    slot: Mutex<Option<StatecraftError>>,
    run_ctx: Context,
}

impl FirstFailure {
    fn new(run_ctx: Context) -> Self {
        Self {
            slot: Mutex::new(None),
            run_ctx,
        }
    }

    /// Keep `err` if it is the first failure and cancel the run.
    fn report(&self, err: StatecraftError) {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            debug!(error = %err, "ignoring failure reported after the first one");
            return;
        }
        error!(error = %err, "resource failed; canceling run");
        *slot = Some(err);
        drop(slot);
        self.run_ctx.cancel();
    }

    fn take(&self) -> Option<StatecraftError> {
        lock(&self.slot).take()
    }
}

/// Reports a panic of the owning task as that resource's failure.
///
/// A panic after the run was canceled is dropped like any other in-flight
/// error.
struct PanicGuard {
    resource: String,
    ctx: Context,
    failure: Arc<FirstFailure>,
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        if self.ctx.is_cancelled() {
            debug!(resource = %self.resource, "resource panicked after the run was canceled; abandoning");
            return;
        }
        self.failure.report(StatecraftError::Panicked {
            resource: self.resource.clone(),
        });
    }
}

struct InboundEdge {
    upstream: String,
    required: Vec<Signal>,
    rx: mpsc::Receiver<Signal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeOutcome {
    Met,
    Unmet,
    Abandoned,
}

/// Broadcasts a resource's signals to every dependent.
#[derive(Default)]
struct Emitter {
    senders: Vec<mpsc::Sender<Signal>>,
}

impl Emitter {
    async fn emit(&self, signal: Signal) {
        for tx in &self.senders {
            // A closed queue means the dependent already decided; nothing to do.
            let _ = tx.send(signal).await;
        }
        debug!(%signal, edges = self.senders.len(), "emitted signal");
    }
}

enum Evaluation {
    Skipped,
    Materialized,
}

struct ResourceTask {
    name: String,
    resource: Arc<dyn Resource>,
    inbound: Vec<InboundEdge>,
    outbound: Emitter,
}

impl ResourceTask {
    async fn run(self, ctx: Context, failure: Arc<FirstFailure>) {
        let _guard = PanicGuard {
            resource: self.name.clone(),
            ctx: ctx.clone(),
            failure: Arc::clone(&failure),
        };
        let ResourceTask {
            name,
            resource,
            inbound,
            outbound,
        } = self;

        let Some(unmet) = wait_for_dependencies(inbound, &ctx).await else {
            debug!("run canceled while waiting on dependencies; abandoning");
            return;
        };
        if ctx.is_cancelled() {
            debug!("run canceled; abandoning");
            return;
        }

        if unmet > 0 {
            info!(unmet, "dependencies not met; leaving resource unevaluated");
            outbound.emit(Signal::Unevaluated).await;
            outbound.emit(Signal::Finished).await;
            return;
        }

        info!("evaluating resource");
        let started = Instant::now();
        let evaluation = match evaluate(&name, resource.as_ref(), &ctx).await {
            Ok(evaluation) => evaluation,
            Err(err) if ctx.is_cancelled() => {
                debug!(error = %err, "resource failed after the run was canceled; abandoning");
                return;
            }
            Err(err) => {
                failure.report(err);
                return;
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match evaluation {
            Evaluation::Skipped => {
                info!(elapsed_ms, "resource already in place; skipped");
                outbound.emit(Signal::Skipped).await;
            }
            Evaluation::Materialized => {
                info!(elapsed_ms, "resource materialized");
                outbound.emit(Signal::Materialized).await;
            }
        }
        outbound.emit(Signal::Evaluated).await;
        outbound.emit(Signal::Finished).await;
    }
}

/// Skip-check, then materialize unless skipped.
async fn evaluate(name: &str, resource: &dyn Resource, ctx: &Context) -> Result<Evaluation> {
    if let Some(check) = resource.skip_check() {
        let skip = check
            .should_skip(ctx)
            .await
            .map_err(|source| StatecraftError::SkipCheck {
                resource: name.to_string(),
                source,
            })?;
        if skip {
            return Ok(Evaluation::Skipped);
        }
    }

    resource
        .materialize(ctx)
        .await
        .map_err(|source| StatecraftError::Materialize {
            resource: name.to_string(),
            source,
        })?;
    Ok(Evaluation::Materialized)
}

/// Wait on every inbound edge concurrently.
///
/// Returns the number of unmet edges, or `None` if any edge was abandoned.
async fn wait_for_dependencies(inbound: Vec<InboundEdge>, ctx: &Context) -> Option<usize> {
    if inbound.is_empty() {
        return Some(0);
    }

    let mut waits = JoinSet::new();
    for edge in inbound {
        waits.spawn(wait_for_signals(edge, ctx.clone()).in_current_span());
    }

    let mut unmet = 0;
    let mut abandoned = false;
    while let Some(joined) = waits.join_next().await {
        match joined {
            Ok(EdgeOutcome::Met) => {}
            Ok(EdgeOutcome::Unmet) => unmet += 1,
            Ok(EdgeOutcome::Abandoned) | Err(_) => abandoned = true,
        }
    }

    (!abandoned).then_some(unmet)
}

async fn wait_for_signals(edge: InboundEdge, ctx: Context) -> EdgeOutcome {
    let InboundEdge {
        upstream,
        required,
        mut rx,
    } = edge;
    let mut outstanding: BTreeSet<Signal> = required.iter().copied().collect();
    if outstanding.is_empty() {
        return EdgeOutcome::Met;
    }

    loop {
        let received = tokio::select! {
            biased;
            _ = ctx.cancelled() => return EdgeOutcome::Abandoned,
            received = rx.recv() => received,
        };

        let Some(signal) = received else {
            debug!(%upstream, "upstream went away without finishing");
            return EdgeOutcome::Abandoned;
        };
        debug!(%upstream, %signal, "received signal");

        outstanding.remove(&signal);
        if outstanding.is_empty() {
            return EdgeOutcome::Met;
        }
        if signal.is_terminal() {
            let missing: Vec<Signal> = outstanding.into_iter().collect();
            info!(
                %upstream,
                missing = %join_signals(&missing),
                "dependency finished without emitting required signals"
            );
            return EdgeOutcome::Unmet;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn feed(signals: &[Signal], required: &[Signal]) -> EdgeOutcome {
        let (tx, rx) = mpsc::channel(EDGE_CAPACITY);
        for &signal in signals {
            tx.send(signal).await.unwrap();
        }
        drop(tx);
        let edge = InboundEdge {
            upstream: "up".to_string(),
            required: required.to_vec(),
            rx,
        };
        wait_for_signals(edge, Context::background()).await
    }

    #[tokio::test]
    async fn edge_met_once_all_required_signals_arrive() {
        let emitted = [Signal::Materialized, Signal::Evaluated, Signal::Finished];
        assert_eq!(
            feed(&emitted, &[Signal::Materialized, Signal::Evaluated]).await,
            EdgeOutcome::Met
        );
        assert_eq!(feed(&emitted, &[Signal::Finished]).await, EdgeOutcome::Met);
    }

    #[tokio::test]
    async fn early_finished_makes_edge_unmet() {
        let emitted = [Signal::Skipped, Signal::Evaluated, Signal::Finished];
        assert_eq!(
            feed(&emitted, &[Signal::Materialized]).await,
            EdgeOutcome::Unmet
        );

        let unevaluated = [Signal::Unevaluated, Signal::Finished];
        assert_eq!(
            feed(&unevaluated, &[Signal::Evaluated, Signal::Finished]).await,
            EdgeOutcome::Unmet
        );
    }

    #[tokio::test]
    async fn closed_queue_or_cancel_abandons() {
        assert_eq!(
            feed(&[Signal::Skipped], &[Signal::Finished]).await,
            EdgeOutcome::Abandoned
        );

        let (_tx, rx) = mpsc::channel(EDGE_CAPACITY);
        let ctx = Context::background();
        ctx.cancel();
        let edge = InboundEdge {
            upstream: "up".to_string(),
            required: vec![Signal::Finished],
            rx,
        };
        assert_eq!(wait_for_signals(edge, ctx).await, EdgeOutcome::Abandoned);
    }

    #[tokio::test]
    async fn first_failure_wins_and_cancels() {
        let ctx = Context::background();
        let failure = FirstFailure::new(ctx.clone());

        failure.report(StatecraftError::Panicked {
            resource: "a".into(),
        });
        failure.report(StatecraftError::Panicked {
            resource: "b".into(),
        });

        assert!(ctx.is_cancelled());
        let kept = failure.take().unwrap();
        assert_eq!(kept.resource(), Some("a"));
    }
}
