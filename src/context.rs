// src/context.rs

//! Cancellation context shared by every resource task of a run.
//!
//! A [`Context`] is a cheap, clonable handle onto a cancellation token.
//! Tokens form a tree: canceling a context cancels every context derived from
//! it with [`Context::child`] or [`Context::with_timeout`], never its parent.
//! The scheduler derives one child per run, so the first fatal error cancels
//! that run without touching the caller's context.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::sync::lock;

#[derive(Debug)]
struct Token {
    cancelled: watch::Sender<bool>,
    children: Mutex<Vec<Weak<Token>>>,
}

impl Token {
    fn new() -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            cancelled,
            children: Mutex::new(Vec::new()),
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    fn cancel(&self) {
        if self.cancelled.send_replace(true) {
            return;
        }
        let children = std::mem::take(&mut *lock(&self.children));
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn child(&self) -> Arc<Token> {
        let child = Arc::new(Token::new());
        let mut children = lock(&self.children);
        // The flag is checked under the lock that `cancel` takes after
        // setting it, so a child is either registered or born canceled.
        if self.is_cancelled() {
            child.cancelled.send_replace(true);
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }
        child
    }
}

/// Cancellation handle passed to every skip-check and materialization.
#[derive(Debug, Clone)]
pub struct Context {
    token: Arc<Token>,
    resource: Option<Arc<str>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A root context that is never canceled unless [`cancel`](Self::cancel)
    /// is called on it.
    pub fn background() -> Self {
        Self {
            token: Arc::new(Token::new()),
            resource: None,
        }
    }

    /// Derive a context that is canceled when `self` is, and that can be
    /// canceled on its own without affecting `self`.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child(),
            resource: self.resource.clone(),
        }
    }

    /// Derive a child context that cancels itself after `timeout`.
    ///
    /// The deadline task ends early once the derived context is canceled or
    /// every handle to it is dropped. Must be called from within a Tokio
    /// runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let ctx = self.child();
        let weak = Arc::downgrade(&ctx.token);
        let mut done = ctx.token.cancelled.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {}
                // Resolves on cancel, or with an error once the token is gone.
                _ = done.wait_for(|cancelled| *cancelled) => return,
            }
            if let Some(token) = weak.upgrade() {
                debug!(?timeout, "context deadline exceeded; canceling");
                token.cancel();
            }
        });
        ctx
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this context is canceled.
    pub async fn cancelled(&self) {
        let mut rx = self.token.cancelled.subscribe();
        // The sender lives inside the token we hold, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` to completion unless the context is canceled first.
    ///
    /// Returns `None` on cancellation; `fut` is dropped in that case.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Name of the resource this context was handed to, if any.
    pub fn resource_name(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Same token, labelled with the resource it is passed to.
    pub(crate) fn for_resource(&self, name: &str) -> Self {
        Self {
            token: Arc::clone(&self.token),
            resource: Some(Arc::from(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_down_not_up() {
        let root = Context::background();
        let child = root.child();
        let grandchild = child.child();

        child.cancel();

        assert!(!root.is_cancelled());
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_context_starts_cancelled() {
        let root = Context::background();
        root.cancel();
        assert!(root.child().is_cancelled());
    }

    #[test]
    fn for_resource_shares_the_token() {
        let root = Context::background();
        let labelled = root.for_resource("web·config");
        assert_eq!(labelled.resource_name(), Some("web·config"));
        assert_eq!(root.resource_name(), None);

        root.cancel();
        assert!(labelled.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let ctx = Context::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn timeout_cancels_only_the_derived_context() {
        let root = Context::background();
        let limited = root.with_timeout(Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(5), limited.cancelled())
            .await
            .expect("deadline should cancel the context");
        assert!(!root.is_cancelled());
    }

    async fn wait_for_no_alive_tasks() -> usize {
        let metrics = tokio::runtime::Handle::current().metrics();
        for _ in 0..500 {
            if metrics.num_alive_tasks() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        metrics.num_alive_tasks()
    }

    #[tokio::test]
    async fn deadline_task_ends_when_context_is_dropped() {
        let root = Context::background();
        let limited = root.with_timeout(Duration::from_secs(3600));
        assert_eq!(tokio::runtime::Handle::current().metrics().num_alive_tasks(), 1);

        drop(limited);
        assert_eq!(wait_for_no_alive_tasks().await, 0);
    }

    #[tokio::test]
    async fn deadline_task_ends_when_context_is_cancelled() {
        let root = Context::background();
        let limited = root.with_timeout(Duration::from_secs(3600));

        root.cancel();
        assert!(limited.is_cancelled());
        assert_eq!(wait_for_no_alive_tasks().await, 0);
    }

    #[tokio::test]
    async fn run_until_cancelled_returns_none_when_cancelled() {
        let ctx = Context::background();
        ctx.cancel();
        let out = ctx.run_until_cancelled(std::future::pending::<()>()).await;
        assert!(out.is_none());

        let live = Context::background();
        assert_eq!(live.run_until_cancelled(async { 7 }).await, Some(7));
    }
}
