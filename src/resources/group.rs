// src/resources/group.rs

//! Group and group-membership resources editing `/etc/group`.

use std::path::PathBuf;

use anyhow::bail;
use tracing::warn;

use super::{read_database, write_database};
use crate::context::Context;
use crate::resource::{BoxFuture, Resource, SkipCheck};

const DEFAULT_GROUP_PATH: &str = "/etc/group";

/// `name:password:gid:members`
struct GroupEntry<'a> {
    fields: Vec<&'a str>,
}

impl<'a> GroupEntry<'a> {
    /// `None` (with a warning) for malformed lines.
    fn parse(line: &'a str, lineno: usize) -> Option<Self> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != 4 {
            warn!(line = lineno, "group database malformed");
            return None;
        }
        Some(Self { fields })
    }

    fn name(&self) -> &str {
        self.fields[0]
    }

    fn has_gid(&self, gid: u32) -> bool {
        self.fields[2] == gid.to_string()
    }

    fn members(&self) -> impl Iterator<Item = &str> {
        self.fields[3].split(',').filter(|m| !m.is_empty())
    }
}

/// Iterate non-empty lines with 1-based line numbers.
fn entries(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.is_empty())
}

/// Ensures the group with `gid` exists and is called `group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResource {
    pub group: String,
    pub gid: u32,
    pub group_path: PathBuf,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, gid: u32) -> Self {
        Self {
            group: group.into(),
            gid,
            group_path: PathBuf::from(DEFAULT_GROUP_PATH),
        }
    }

    pub fn group_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.group_path = path.into();
        self
    }

    fn is_present(&self, contents: &str) -> bool {
        entries(contents)
            .filter_map(|(lineno, line)| GroupEntry::parse(line, lineno))
            .find(|entry| entry.has_gid(self.gid))
            .is_some_and(|entry| entry.name() == self.group)
    }

    /// Rename the entry owning our gid, or append a fresh one.
    fn updated(&self, contents: &str) -> Vec<String> {
        let mut found = false;
        let mut lines = Vec::new();
        for (lineno, line) in entries(contents) {
            match GroupEntry::parse(line, lineno) {
                Some(mut entry) if entry.has_gid(self.gid) => {
                    found = true;
                    entry.fields[0] = &self.group;
                    lines.push(entry.fields.join(":"));
                }
                _ => lines.push(line.to_string()),
            }
        }
        if !found {
            lines.push(format!("{}:x:{}:", self.group, self.gid));
        }
        lines
    }
}

impl Resource for GroupResource {
    fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let contents = read_database(&self.group_path).await?;
            write_database(&self.group_path, &self.updated(&contents)).await
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl SkipCheck for GroupResource {
    fn should_skip<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            let contents = read_database(&self.group_path).await?;
            Ok(self.is_present(&contents))
        })
    }
}

/// Ensures `user` is listed as a member of the group with `gid`.
///
/// The group itself must already exist; gate this on the matching
/// [`GroupResource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembershipResource {
    pub gid: u32,
    pub user: String,
    pub group_path: PathBuf,
}

impl GroupMembershipResource {
    pub fn new(user: impl Into<String>, gid: u32) -> Self {
        Self {
            gid,
            user: user.into(),
            group_path: PathBuf::from(DEFAULT_GROUP_PATH),
        }
    }

    pub fn group_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.group_path = path.into();
        self
    }

    fn is_member(&self, contents: &str) -> anyhow::Result<bool> {
        let entry = entries(contents)
            .filter_map(|(lineno, line)| GroupEntry::parse(line, lineno))
            .find(|entry| entry.has_gid(self.gid));
        match entry {
            Some(entry) => Ok(entry.members().any(|member| member == self.user)),
            None => bail!(
                "{} does not contain group {}",
                self.group_path.display(),
                self.gid
            ),
        }
    }

    fn updated(&self, contents: &str) -> anyhow::Result<Vec<String>> {
        let mut found = false;
        let mut lines = Vec::new();
        for (lineno, line) in entries(contents) {
            match GroupEntry::parse(line, lineno) {
                Some(entry) if entry.has_gid(self.gid) => {
                    found = true;
                    let mut members: Vec<&str> = entry.members().collect();
                    if !members.contains(&self.user.as_str()) {
                        members.push(&self.user);
                    }
                    let joined = members.join(",");
                    let mut fields = entry.fields.clone();
                    fields[3] = &joined;
                    lines.push(fields.join(":"));
                }
                _ => lines.push(line.to_string()),
            }
        }
        if !found {
            bail!(
                "{} does not contain group {}",
                self.group_path.display(),
                self.gid
            );
        }
        Ok(lines)
    }
}

impl Resource for GroupMembershipResource {
    fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let contents = read_database(&self.group_path).await?;
            let lines = self.updated(&contents)?;
            write_database(&self.group_path, &lines).await
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl SkipCheck for GroupMembershipResource {
    fn should_skip<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            let contents = read_database(&self.group_path).await?;
            self.is_member(&contents)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "root:x:0:\nsudo:x:150:alice\nbroken line\nwheel:x:10:\n";

    #[test]
    fn group_presence_requires_matching_name() {
        assert!(GroupResource::new("sudo", 150).is_present(GROUP));
        assert!(!GroupResource::new("admins", 150).is_present(GROUP));
        assert!(!GroupResource::new("docker", 233).is_present(GROUP));
    }

    #[test]
    fn group_is_renamed_or_appended() {
        let renamed = GroupResource::new("admins", 150).updated(GROUP);
        assert_eq!(renamed[1], "admins:x:150:alice");
        assert_eq!(renamed[2], "broken line");

        let appended = GroupResource::new("docker", 233).updated(GROUP);
        assert_eq!(appended.last().map(String::as_str), Some("docker:x:233:"));
    }

    #[test]
    fn membership_is_appended_once() {
        let bob = GroupMembershipResource::new("bob", 150);
        assert!(!bob.is_member(GROUP).unwrap());

        let lines = bob.updated(GROUP).unwrap();
        assert_eq!(lines[1], "sudo:x:150:alice,bob");
        assert!(bob.is_member(&lines.join("\n")).unwrap());

        let wheel = GroupMembershipResource::new("bob", 10).updated(GROUP).unwrap();
        assert_eq!(wheel[3], "wheel:x:10:bob");
    }

    #[test]
    fn membership_in_missing_group_is_an_error() {
        let carol = GroupMembershipResource::new("carol", 999);
        assert!(carol.is_member(GROUP).is_err());
        assert!(carol.updated(GROUP).is_err());
    }

    #[tokio::test]
    async fn materializes_into_custom_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("group");
        std::fs::write(&path, GROUP).unwrap();
        let ctx = Context::background();

        let group = GroupResource::new("docker", 233).group_path(&path);
        group.materialize(&ctx).await.unwrap();
        assert!(group.should_skip(&ctx).await.unwrap());

        let member = GroupMembershipResource::new("bob", 233).group_path(&path);
        assert!(!member.should_skip(&ctx).await.unwrap());
        member.materialize(&ctx).await.unwrap();
        assert!(member.should_skip(&ctx).await.unwrap());
    }
}
