//! `git add` + `git commit` checkpointing of the `.tasks/` directory.

use std::path::Path;
use std::process::Command;

use super::PersistError;

/// Stage and commit everything under `tasks_dir` (relative to `repo_root`).
/// A commit with nothing to stage is not an error — `git commit` exiting 1
/// with "nothing to commit" is swallowed.
pub fn commit_tasks_dir(repo_root: &Path, tasks_dir: &Path, message: &str) -> Result<bool, PersistError> {
    let add_status = Command::new("git")
        .arg("add")
        .arg(tasks_dir)
        .current_dir(repo_root)
        .status()
        .map_err(|e| PersistError::Git(e.to_string()))?;
    if !add_status.success() {
        return Err(PersistError::Git(format!("git add exited with {add_status}")));
    }

    let output = Command::new("git")
        .arg("commit")
        .arg("-m")
        .arg(message)
        .current_dir(repo_root)
        .output()
        .map_err(|e| PersistError::Git(e.to_string()))?;

    if output.status.success() {
        return Ok(true);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.contains("nothing to commit") {
        return Ok(false);
    }
    Err(PersistError::Git(format!(
        "git commit failed: {}",
        String::from_utf8_lossy(&output.stderr)
    )))
}
