// src/resources/mod.rs

//! Concrete resources for provisioning a Unix host.
//!
//! Every resource here is idempotent together with its skip-check: running a
//! graph twice without outside interference materializes on the first run and
//! skips on the second. [`CmdResource`] is the exception; it has no
//! skip-check and is usually gated on another resource's `Materialized`
//! signal or wrapped in a [`SkippingWrapper`](crate::SkippingWrapper).

pub mod cmd;
pub mod directory;
pub mod file;
pub mod group;
pub mod systemd;
pub mod user;

use std::fs::Metadata;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use anyhow::Context as _;
use tracing::info;

pub use cmd::CmdResource;
pub use directory::DirectoryResource;
pub use file::FileResource;
pub use group::{GroupMembershipResource, GroupResource};
pub use user::UserResource;

/// Mask for the permission bits compared and applied by file-like resources.
const MODE_MASK: u32 = 0o7777;

/// Desired permission bits and owner of a filesystem entry.
///
/// `None` owner fields are left alone, both when checking and when applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attributes {
    pub(crate) mode: u32,
    pub(crate) uid: Option<u32>,
    pub(crate) gid: Option<u32>,
}

impl Attributes {
    /// Whether `meta` already carries these attributes. Logs the first
    /// mismatch.
    pub(crate) fn matches(&self, path: &Path, meta: &Metadata) -> bool {
        let current = meta.permissions().mode() & MODE_MASK;
        if current != self.mode & MODE_MASK {
            info!(
                path = %path.display(),
                current = %format!("{current:o}"),
                wanted = %format!("{:o}", self.mode & MODE_MASK),
                "mode has changed"
            );
            return false;
        }

        let uid_ok = self.uid.is_none_or(|uid| uid == meta.uid());
        let gid_ok = self.gid.is_none_or(|gid| gid == meta.gid());
        if !uid_ok || !gid_ok {
            info!(
                path = %path.display(),
                uid = meta.uid(),
                gid = meta.gid(),
                "owner has changed"
            );
            return false;
        }
        true
    }

    /// The masked mode bits as permissions.
    pub(crate) fn permissions(&self) -> std::fs::Permissions {
        std::fs::Permissions::from_mode(self.mode & MODE_MASK)
    }

    /// Set mode, then owner, on `path`.
    pub(crate) async fn apply(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::set_permissions(path, self.permissions())
            .await
            .with_context(|| format!("could not set mode of {}", path.display()))?;

        if self.uid.is_some() || self.gid.is_some() {
            std::os::unix::fs::chown(path, self.uid, self.gid)
                .with_context(|| format!("could not set owner of {}", path.display()))?;
        }
        Ok(())
    }
}

/// Read a colon-separated database file such as `/etc/passwd`.
pub(crate) async fn read_database(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("could not read {}", path.display()))
}

/// Write a database file back, one entry per line, newline terminated.
pub(crate) async fn write_database(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write to {}", path.display()))
}
