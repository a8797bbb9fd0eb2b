use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use statecraft::{BoxFuture, Context, Resource, SkipCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The scheduler asked the fake resource's skip-check.
    SkipCheck,
    /// The fake resource's materialization ran to completion (successfully or not).
    Materialize,
    /// The fake resource observed cancellation while materializing.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub label: String,
    pub kind: EventKind,
    /// Name the scheduler handed in through the context.
    pub context_name: Option<String>,
}

/// Shared, ordered record of what fake resources did.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, label: &str, kind: EventKind, ctx: &Context) {
        self.events.lock().unwrap().push(Event {
            label: label.to_string(),
            kind,
            context_name: ctx.resource_name().map(str::to_string),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Labels of fake resources that materialized, in completion order.
    pub fn materialized(&self) -> Vec<String> {
        self.labels_of(EventKind::Materialize)
    }

    /// Labels of fake resources whose skip-check ran, in order.
    pub fn skip_checked(&self) -> Vec<String> {
        self.labels_of(EventKind::SkipCheck)
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.labels_of(EventKind::Cancelled)
    }

    pub fn did_materialize(&self, label: &str) -> bool {
        self.materialized().iter().any(|l| l == label)
    }

    /// Index of `label`'s materialization in the log.
    pub fn materialize_index(&self, label: &str) -> Option<usize> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.kind == EventKind::Materialize && e.label == label)
    }

    fn labels_of(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.label.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum SkipBehaviour {
    Absent,
    Answer(bool),
    Fail,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Succeed,
    Fail,
    Panic,
    /// Block until the context is canceled, then fail.
    WaitForCancel,
    /// Block until the context is canceled, then panic.
    PanicOnCancel,
}

/// Scriptable resource that records into an [`EventLog`].
#[derive(Debug, Clone)]
pub struct FakeResource {
    label: String,
    log: EventLog,
    skip: SkipBehaviour,
    action: Action,
    delay: Duration,
}

impl FakeResource {
    /// Materializes successfully; no skip-check.
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            skip: SkipBehaviour::Absent,
            action: Action::Succeed,
            delay: Duration::ZERO,
        }
    }

    /// Skip-check always answers "skip".
    pub fn skipping(label: impl Into<String>, log: &EventLog) -> Self {
        Self::new(label, log).skip_answer(true)
    }

    /// Materialization fails.
    pub fn failing(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            action: Action::Fail,
            ..Self::new(label, log)
        }
    }

    pub fn skip_answer(mut self, skip: bool) -> Self {
        self.skip = SkipBehaviour::Answer(skip);
        self
    }

    pub fn failing_skip_check(mut self) -> Self {
        self.skip = SkipBehaviour::Fail;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.action = Action::Panic;
        self
    }

    pub fn waiting_for_cancel(mut self) -> Self {
        self.action = Action::WaitForCancel;
        self
    }

    pub fn panicking_on_cancel(mut self) -> Self {
        self.action = Action::PanicOnCancel;
        self
    }

    /// Sleep this long before materializing.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Resource for FakeResource {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.action {
                Action::Succeed => {
                    self.log.push(&self.label, EventKind::Materialize, ctx);
                    Ok(())
                }
                Action::Fail => {
                    self.log.push(&self.label, EventKind::Materialize, ctx);
                    bail!("fake resource {} failed on purpose", self.label)
                }
                Action::Panic => panic!("fake resource {} panicked on purpose", self.label),
                Action::WaitForCancel => {
                    ctx.cancelled().await;
                    self.log.push(&self.label, EventKind::Cancelled, ctx);
                    bail!("fake resource {} saw cancellation", self.label)
                }
                Action::PanicOnCancel => {
                    ctx.cancelled().await;
                    self.log.push(&self.label, EventKind::Cancelled, ctx);
                    panic!("fake resource {} panicked while shutting down", self.label)
                }
            }
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        match self.skip {
            SkipBehaviour::Absent => None,
            _ => Some(self),
        }
    }
}

impl SkipCheck for FakeResource {
    fn should_skip<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            self.log.push(&self.label, EventKind::SkipCheck, ctx);
            match self.skip {
                SkipBehaviour::Answer(skip) => Ok(skip),
                SkipBehaviour::Fail => bail!("fake resource {} skip-check failed on purpose", self.label),
                SkipBehaviour::Absent => Ok(false),
            }
        })
    }
}
