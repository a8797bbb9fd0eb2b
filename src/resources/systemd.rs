// src/resources/systemd.rs

//! systemd helpers, driven through `systemctl`.

use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::Context as _;

use super::CmdResource;
use crate::context::Context;
use crate::resource::{BoxFuture, Resource, SkippingWrapper};

/// `systemctl daemon-reload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonReload {
    cmd: CmdResource,
}

impl Default for DaemonReload {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonReload {
    pub fn new() -> Self {
        Self::with_systemctl("systemctl")
    }

    /// Use another `systemctl` binary, e.g. a wrapper or a test double.
    pub fn with_systemctl(program: impl Into<String>) -> Self {
        Self {
            cmd: CmdResource::new(program).arg("daemon-reload"),
        }
    }
}

impl Resource for DaemonReload {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.cmd
                .materialize(ctx)
                .await
                .context("could not call daemon reload")
        })
    }
}

/// `systemctl start <unit>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartUnit {
    pub unit: String,
    cmd: CmdResource,
}

impl StartUnit {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_systemctl("systemctl", unit)
    }

    pub fn with_systemctl(program: impl Into<String>, unit: impl Into<String>) -> Self {
        let unit = unit.into();
        Self {
            cmd: CmdResource::new(program).arg("start").arg(unit.clone()),
            unit,
        }
    }
}

impl Resource for StartUnit {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.cmd
                .materialize(ctx)
                .await
                .with_context(|| format!("could not start unit {}", self.unit))
        })
    }
}

/// Reload the systemd daemon unless the unit file at `unit_path` was last
/// modified before `before`.
///
/// Take `before` right before materializing the graph that writes the unit
/// file, and gate this resource on that file's `Finished` signal.
pub fn reload_if_modified(
    unit_path: impl Into<PathBuf>,
    before: SystemTime,
) -> SkippingWrapper<DaemonReload> {
    skip_unless_modified(DaemonReload::new(), unit_path.into(), before)
}

/// Skip `resource` unless the file at `unit_path` was modified at or after
/// `before`.
pub fn skip_unless_modified<R: Resource>(
    resource: R,
    unit_path: PathBuf,
    before: SystemTime,
) -> SkippingWrapper<R> {
    SkippingWrapper::new(resource, move |_ctx| {
        let modified = std::fs::metadata(&unit_path)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("could not stat unit file {}", unit_path.display()))?;
        Ok(modified < before)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn skips_when_unit_file_is_older() {
        let dir = tempfile::tempdir().unwrap();
        let unit = dir.path().join("app.service");
        std::fs::write(&unit, "[Unit]\n").unwrap();
        let ctx = Context::background();

        let later = SystemTime::now() + Duration::from_secs(3600);
        let reload = reload_if_modified(&unit, later);
        let check = reload.skip_check().unwrap();
        assert!(check.should_skip(&ctx).await.unwrap());

        let earlier = SystemTime::now() - Duration::from_secs(3600);
        let reload = reload_if_modified(&unit, earlier);
        let check = reload.skip_check().unwrap();
        assert!(!check.should_skip(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn missing_unit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let reload = reload_if_modified(dir.path().join("nope.service"), SystemTime::now());
        let ctx = Context::background();
        assert!(reload.skip_check().unwrap().should_skip(&ctx).await.is_err());
    }

    #[tokio::test]
    async fn commands_go_through_systemctl() {
        let ctx = Context::background();
        DaemonReload::with_systemctl("true")
            .materialize(&ctx)
            .await
            .unwrap();

        let err = StartUnit::with_systemctl("false", "app.service")
            .materialize(&ctx)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("could not start unit app.service"));
    }
}
