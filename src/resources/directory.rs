// src/resources/directory.rs

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context as _;
use tracing::debug;

use super::Attributes;
use crate::context::Context;
use crate::resource::{BoxFuture, Resource, SkipCheck};

/// Ensures a directory exists with the given mode and owner.
///
/// Missing parents are created with default permissions; only the leaf
/// directory gets `mode` and the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResource {
    pub path: PathBuf,
    pub mode: u32,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl DirectoryResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: 0o755,
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

    fn attributes(&self) -> Attributes {
        Attributes {
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
        }
    }
}

impl Resource for DirectoryResource {
    fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.path)
                .await
                .with_context(|| format!("could not create directory {}", self.path.display()))?;
            self.attributes().apply(&self.path).await
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl SkipCheck for DirectoryResource {
    fn should_skip<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            match tokio::fs::metadata(&self.path).await {
                Ok(meta) => Ok(meta.is_dir() && self.attributes().matches(&self.path, &meta)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!(path = %self.path.display(), "directory does not exist");
                    Ok(false)
                }
                Err(err) => {
                    Err(err).with_context(|| format!("could not stat {}", self.path.display()))
                }
            }
        })
    }
}
