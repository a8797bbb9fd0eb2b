// src/resource/mod.rs

//! The capability contract every materializable unit satisfies.
//!
//! - [`Resource`] is the required capability: bring some piece of system
//!   state into its desired shape.
//! - [`SkipCheck`] is optional: report that the state is already correct so
//!   materialization can be skipped. A resource exposes it through
//!   [`Resource::skip_check`], which the scheduler queries once per run.
//! - [`skip`] provides [`SkippingWrapper`], which bolts an extra skip
//!   predicate onto an existing resource.
//!
//! Names are not part of the contract: the owning
//! [`ResourceGraph`](crate::dag::ResourceGraph) assigns them at registration
//! and hands them back through [`Context::resource_name`].

pub mod skip;

use std::future::Future;
use std::pin::Pin;

use crate::context::Context;

pub use skip::SkippingWrapper;

/// Boxed `Send` future, the return type of the capability methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can be materialized.
///
/// Implementations must be idempotent in combination with their skip-check,
/// if they have one. Errors are reported with [`anyhow`]; the scheduler wraps
/// them with the resource name.
pub trait Resource: Send + Sync + 'static {
    /// Bring the described state into existence.
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>>;

    /// The optional skip-check capability.
    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        None
    }
}

/// Side-effect free check whether materialization can be skipped.
pub trait SkipCheck: Send + Sync {
    /// `Ok(true)` when the resource is already in its desired state.
    fn should_skip<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>>;
}

impl<R: Resource + ?Sized> Resource for Box<R> {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        (**self).materialize(ctx)
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        (**self).skip_check()
    }
}
