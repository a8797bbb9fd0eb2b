// src/resource/skip.rs

//! Attach an ad-hoc skip predicate to an existing resource.

use std::fmt;

use tracing::warn;

use super::{BoxFuture, Resource, SkipCheck};
use crate::context::Context;

type SkipFn =
    Box<dyn for<'a> Fn(&'a Context) -> BoxFuture<'a, anyhow::Result<bool>> + Send + Sync>;

/// Wraps a resource with a custom skip predicate.
///
/// The predicate is evaluated first:
/// - `Ok(true)` skips without consulting anything else.
/// - `Ok(false)` falls through to the wrapped resource's own skip-check, so
///   the two conditions are additive. Without one, the resource is not
///   skipped.
/// - `Err(_)` also consults the wrapped skip-check. If that one reports the
///   resource as already in place, the predicate error is logged and the
///   resource is skipped; otherwise the predicate error is returned.
///
/// Materialization always delegates to the wrapped resource.
pub struct SkippingWrapper<R> {
    resource: R,
    skip: SkipFn,
}

impl<R> fmt::Debug for SkippingWrapper<R>
where
    R: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkippingWrapper")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl<R: Resource> SkippingWrapper<R> {
    /// Wrap `resource` with a synchronous predicate.
    pub fn new<F>(resource: R, skip: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self {
            resource,
            skip: Box::new(move |ctx| {
                let answer = skip(ctx);
                Box::pin(async move { answer })
            }),
        }
    }

    /// Wrap `resource` with an asynchronous predicate.
    pub fn new_async<F>(resource: R, skip: F) -> Self
    where
        F: for<'a> Fn(&'a Context) -> BoxFuture<'a, anyhow::Result<bool>> + Send + Sync + 'static,
    {
        Self {
            resource,
            skip: Box::new(skip),
        }
    }

    pub fn inner(&self) -> &R {
        &self.resource
    }

    pub fn into_inner(self) -> R {
        self.resource
    }
}

impl<R: Resource> Resource for SkippingWrapper<R> {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        self.resource.materialize(ctx)
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl<R: Resource> SkipCheck for SkippingWrapper<R> {
    fn should_skip<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            let custom = (self.skip)(ctx).await;
            if let Ok(true) = custom {
                return Ok(true);
            }

            let Some(inner) = self.resource.skip_check() else {
                return custom;
            };

            match custom {
                Ok(_) => inner.should_skip(ctx).await,
                Err(err) => match inner.should_skip(ctx).await {
                    Ok(true) => {
                        warn!(
                            error = %format!("{err:#}"),
                            "skip predicate failed but resource reports itself in place; skipping"
                        );
                        Ok(true)
                    }
                    _ => Err(err),
                },
            }
        })
    }
}
