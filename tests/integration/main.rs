//! Integration tests for Pinion

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const INDEX: &str = r#"
[[package]]
name = "rack"
version = "1.0"

[[package]]
name = "rack"
version = "1.2"

[[package]]
name = "app"
version = "1.0"
[package.dependencies]
rack = ">=1.2"
"#;

/// A scratch project with its own cache and config
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("index")).unwrap();
        std::fs::write(dir.path().join("index/index.toml"), INDEX).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn manifest(&self, content: &str) {
        std::fs::write(self.path().join("pinion.toml"), content).unwrap();
    }

    fn lock(&self) -> String {
        std::fs::read_to_string(self.path().join("pinion.lock")).unwrap()
    }

    fn has_lock(&self) -> bool {
        self.path().join("pinion.lock").exists()
    }

    fn pinion(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("pinion");
        cmd.env("PINION_CACHE_DIR", self.path().join("cache"))
            .env("PINION_CONFIG", self.path().join("config.toml"))
            .env("CI", "1")
            .arg("--manifest")
            .arg(self.path().join("pinion.toml"));
        cmd
    }
}

mod cli_tests {
    use super::*;
    use predicates::prelude::*;

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("pinion")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("locking"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("pinion")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pinion"));
    }

    #[test]
    fn config_path() {
        let project = Project::new();
        project
            .pinion()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let project = Project::new();
        project
            .pinion()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"));
    }

    #[test]
    fn missing_manifest_fails() {
        let project = Project::new();
        project
            .pinion()
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Manifest not found"));
    }

    #[test]
    fn install_with_index_source() {
        let project = Project::new();
        project.manifest(
            r#"
[sources.default]
index = "index"

[dependencies]
app = "1.0"
"#,
        );

        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using app (1.0.0)"))
            .stdout(predicate::str::contains("Using rack (1.2.0)"))
            .stdout(predicate::str::contains("Lock complete!"));

        let lock = project.lock();
        assert!(lock.contains("name = \"rack\""));
        assert!(lock.contains("version = \"1.2.0\""));
    }

    #[test]
    fn install_with_path_source() {
        let project = Project::new();
        let local = project.path().join("local");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(
            local.join("package.toml"),
            "[package]\nname = \"widget\"\nversion = \"0.3\"\n",
        )
        .unwrap();
        project.manifest(
            r#"
[sources.local]
path = "local"

[dependencies]
widget = { version = ">=0.1", source = "local" }
"#,
        );

        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using widget (0.3.0)"));
    }

    #[test]
    fn conflict_fails_without_writing_lock() {
        let project = Project::new();
        project.manifest(
            r#"
[sources.default]
index = "index"

[dependencies]
rack = "=1.0"
app = "1.0"
"#,
        );

        project
            .pinion()
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Could not find compatible versions"))
            .stderr(predicate::str::contains("rack"));

        assert!(!project.has_lock());
    }

    #[test]
    fn update_unknown_name_fails() {
        let project = Project::new();
        project.manifest(
            r#"
[sources.default]
index = "index"

[dependencies]
rack = "1.0"
"#,
        );
        project.pinion().arg("install").assert().success();

        project
            .pinion()
            .args(["update", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No such source or package"));
    }

    #[test]
    fn reinstall_leaves_lock_unchanged() {
        let project = Project::new();
        project.manifest(
            r#"
[sources.default]
index = "index"

[dependencies]
app = "1.0"
"#,
        );

        project.pinion().arg("install").assert().success();
        let first = project.lock();

        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("lockfile unchanged"));
        assert_eq!(first, project.lock());
    }

    #[test]
    fn cache_list_json_empty() {
        let project = Project::new();
        project
            .pinion()
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[]"));
    }

    #[test]
    fn cache_list_empty() {
        let project = Project::new();
        project
            .pinion()
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached repositories"));
    }
}

/// Scenarios against real repositories; skipped when `git` is missing
mod git_tests {
    use super::*;
    use predicates::prelude::*;
    use std::process::Command as StdCommand;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .current_dir(dir)
            .args(["-c", "protocol.file.allow=always"])
            .args(args)
            .env("GIT_AUTHOR_NAME", "Test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A repository holding one package, with a commit on `main`
    fn package_repo(root: &Path, dir: &str, name: &str, version: &str) -> PathBuf {
        let repo = root.join(dir);
        std::fs::create_dir_all(&repo).unwrap();
        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        commit_package(&repo, name, version);
        repo
    }

    fn commit_package(repo: &Path, name: &str, version: &str) -> String {
        std::fs::write(
            repo.join("package.toml"),
            format!("[package]\nname = \"{}\"\nversion = \"{}\"\n", name, version),
        )
        .unwrap();
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", &format!("{} {}", name, version)]);
        git(repo, &["rev-parse", "HEAD"])
    }

    fn git_manifest(url: &Path, extra: &str, package: &str) -> String {
        format!(
            r#"
[sources.foo]
git = "{}"
{}

[dependencies]
{} = {{ version = ">=0", source = "foo" }}
"#,
            url.display(),
            extra,
            package
        )
    }

    #[test]
    fn branch_tip_floats_on_plain_rerun() {
        if !git_available() {
            return;
        }
        let project = Project::new();
        let repo = package_repo(project.path(), "foo", "foo", "1.0");
        git(&repo, &["checkout", "-q", "-b", "omg"]);
        let first = commit_package(&repo, "foo", "1.0.1");
        project.manifest(&git_manifest(&repo, "branch = \"omg\"", "foo"));

        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Fetching"))
            .stdout(predicate::str::contains("at omg@"));
        assert!(project.lock().contains(&first));

        let unmoved = project.lock();
        project.pinion().arg("install").assert().success();
        assert_eq!(unmoved, project.lock());

        let second = commit_package(&repo, "foo", "1.1");
        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using foo (1.1.0)"));
        let lock = project.lock();
        assert!(lock.contains(&second));
        assert!(!lock.contains(&first));
    }

    #[test]
    fn url_change_refetches_without_update() {
        if !git_available() {
            return;
        }
        let project = Project::new();
        let old = package_repo(project.path(), "old", "foo", "1.0");
        let new = package_repo(project.path(), "new", "foo", "2.0");
        project.manifest(&git_manifest(&old, "", "foo"));
        project.pinion().arg("install").assert().success();

        project.manifest(&git_manifest(&new, "", "foo"));
        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("Fetching {}", new.display())))
            .stdout(predicate::str::contains("Using foo (2.0.0)"));

        let new_head = git(&new, &["rev-parse", "HEAD"]);
        assert!(project.lock().contains(&new_head));
    }

    #[test]
    fn submodule_toggle_changes_candidates() {
        if !git_available() {
            return;
        }
        let project = Project::new();
        let inner = package_repo(project.path(), "inner", "inner", "0.5");
        let outer = package_repo(project.path(), "outer", "outer", "1.0");
        git(
            &outer,
            &["submodule", "add", "-q", &inner.display().to_string(), "vendor/inner"],
        );
        git(&outer, &["commit", "-q", "-m", "add submodule"]);

        project.manifest(&git_manifest(&outer, "submodules = true", "inner"));
        project
            .pinion()
            .arg("install")
            .assert()
            .success()
            .stdout(predicate::str::contains("Using inner (0.5.0)"));
        assert!(project.lock().contains("submodules = true"));

        project.manifest(&git_manifest(&outer, "", "inner"));
        project
            .pinion()
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Could not find package inner"));
    }

    #[test]
    fn scoped_update_keeps_other_revisions() {
        if !git_available() {
            return;
        }
        let project = Project::new();
        let foo = package_repo(project.path(), "foo", "foo", "1.0");
        let bar = package_repo(project.path(), "bar", "bar", "1.0");
        project.manifest(&format!(
            r#"
[sources.foo]
git = "{}"

[sources.bar]
git = "{}"

[dependencies]
foo = {{ version = ">=0", source = "foo" }}
bar = {{ version = ">=0", source = "bar" }}
"#,
            foo.display(),
            bar.display()
        ));
        project.pinion().arg("install").assert().success();
        let bar_first = git(&bar, &["rev-parse", "HEAD"]);

        let foo_next = commit_package(&foo, "foo", "1.1");
        let bar_next = commit_package(&bar, "bar", "1.1");

        project
            .pinion()
            .args(["update", "--source", "foo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Lock updated!"));

        let lock = project.lock();
        assert!(lock.contains(&foo_next));
        assert!(lock.contains(&bar_first));
        assert!(!lock.contains(&bar_next));
    }
}
