// src/resources/user.rs

use std::path::PathBuf;

use tracing::{info, warn};

use super::{read_database, write_database};
use crate::context::Context;
use crate::resource::{BoxFuture, Resource, SkipCheck};

/// Ensures a local user exists with exactly these attributes.
///
/// Only the passwd database is touched. The password field is always `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserResource {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    pub shell: PathBuf,
    /// Database to edit, `/etc/passwd` unless overridden.
    pub passwd_path: PathBuf,
}

impl UserResource {
    pub fn new(user: impl Into<String>, uid: u32, gid: u32) -> Self {
        let user = user.into();
        Self {
            home: PathBuf::from("/home").join(&user),
            shell: PathBuf::from("/bin/sh"),
            passwd_path: PathBuf::from("/etc/passwd"),
            user,
            uid,
            gid,
        }
    }

    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn passwd_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.passwd_path = path.into();
        self
    }

    /// The line this user should have in the passwd database.
    pub fn passwd_line(&self) -> String {
        format!(
            "{}:x:{}:{}::{}:{}",
            self.user,
            self.uid,
            self.gid,
            self.home.display(),
            self.shell.display()
        )
    }

    fn is_present(&self, passwd: &str) -> bool {
        let expected = self.passwd_line();
        for line in passwd.lines() {
            if line == expected {
                return true;
            }
            if defines_uid(line, self.uid) {
                info!(uid = self.uid, "found user registered with different attributes");
                return false;
            }
        }
        false
    }

    /// Replace the entry that owns our uid, or append one.
    fn updated(&self, passwd: &str) -> Vec<String> {
        let expected = self.passwd_line();
        let mut replaced = false;
        let mut lines = Vec::new();
        for line in passwd.lines().filter(|line| !line.is_empty()) {
            if line == expected {
                warn!(user = %self.user, "user already present although the skip-check said otherwise");
                replaced = true;
                lines.push(line.to_string());
            } else if defines_uid(line, self.uid) {
                replaced = true;
                lines.push(expected.clone());
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(expected);
        }
        lines
    }
}

fn defines_uid(line: &str, uid: u32) -> bool {
    let fields: Vec<&str> = line.split(':').collect();
    fields.len() == 7 && fields[2] == uid.to_string()
}

impl Resource for UserResource {
    fn materialize<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let passwd = read_database(&self.passwd_path).await?;
            write_database(&self.passwd_path, &self.updated(&passwd)).await
        })
    }

    fn skip_check(&self) -> Option<&dyn SkipCheck> {
        Some(self)
    }
}

impl SkipCheck for UserResource {
    fn should_skip<'a>(&'a self, _ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            let passwd = read_database(&self.passwd_path).await?;
            Ok(self.is_present(&passwd))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\nold:x:1000:1000::/home/old:/bin/sh\n";

    fn lcm() -> UserResource {
        UserResource::new("lcm", 1000, 1000).shell("/bin/bash")
    }

    #[test]
    fn formats_passwd_line() {
        assert_eq!(lcm().passwd_line(), "lcm:x:1000:1000::/home/lcm:/bin/bash");
    }

    #[test]
    fn replaces_entry_with_same_uid() {
        let user = lcm();
        assert!(!user.is_present(PASSWD));

        let lines = user.updated(PASSWD);
        assert_eq!(
            lines,
            vec![
                "root:x:0:0:root:/root:/bin/bash".to_string(),
                "lcm:x:1000:1000::/home/lcm:/bin/bash".to_string(),
            ]
        );
        assert!(user.is_present(&lines.join("\n")));
    }

    #[test]
    fn appends_missing_user() {
        let user = UserResource::new("svc", 1001, 1001);
        let lines = user.updated(PASSWD);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "svc:x:1001:1001::/home/svc:/bin/sh");
    }

    #[tokio::test]
    async fn materializes_into_custom_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passwd");
        std::fs::write(&path, PASSWD).unwrap();

        let user = lcm().passwd_path(&path);
        let ctx = Context::background();
        assert!(!user.should_skip(&ctx).await.unwrap());
        user.materialize(&ctx).await.unwrap();
        assert!(user.should_skip(&ctx).await.unwrap());
    }
}
