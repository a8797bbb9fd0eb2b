// src/resources/file.rs

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::Attributes;
use crate::context::Context;
use crate::resource::{BoxFuture, Resource, SkipCheck};

/// Ensures the file at `path` has the given contents, mode and owner.
///
/// Parent directories are not created; gate the file on a
/// [`DirectoryResource`](super::DirectoryResource) for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResource {
    pub path: PathBuf,
    pub contents: String,
    pub mode: u32,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl FileResource {
    /// A `0644` file owned by whoever materializes it.
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            mode: 0o644,
            uid: None,
            gid: None,
        }
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = Some(uid);
        self.gid = Some(gid);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn attributes(&self) -> Attributes {
        Attributes {
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
        }
    }

    async fn in_place(&self) -> anyhow::Result<bool> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "target does not exist");
                return Ok(false);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("could not stat {}", self.path.display()));
            }
        };

        if !meta.is_file() || !self.attributes().matches(&self.path, &meta) {
            return Ok(false);
        }

        let current = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("could not read {}", self.path.display()))?;
        Ok(current == self.contents.as_bytes())
    }
}

impl Resource for FileResource {
    fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let attributes = self.attributes();
            let permissions = attributes.permissions();
            // New files are born with the target mode and existing ones are
            // narrowed before any contents land.
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(permissions.mode())
                .open(&self.path)
                .await
                .with_context(|| format!("could not open {}", self.path.display()))?;
            file.set_permissions(permissions)
                .await
                .with_context(|| format!("could not set mode of {}", self.path.display()))?;
            file.write_all(self.contents.as_bytes())
                .await
                .with_context(|| format!("could not write to {}", self.path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("could not flush {}", self.path.display()))?;
            drop(file);

            attributes.apply(&self.path).await
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl SkipCheck for FileResource {
    fn should_skip<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(self.in_place())
    }
}
