//! Durability for the task graph: a transactional embedded relational store
//! for day-to-day reads/writes, JSONL export/import for portable backup,
//! a human-readable session snapshot for cold-start recovery, and git
//! commit checkpointing.

mod db;
mod error;
mod git;
mod jsonl;
mod session_state;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use db::Database;
pub use error::PersistError;
pub use session_state::SessionStateSnapshot;

use crate::scheduler::TaskScheduler;

/// On-disk layout rooted at `<repo>/.tasks/`.
pub struct Persistence {
    repo_root: PathBuf,
    tasks_dir: PathBuf,
    db: Option<Database>,
}

impl Persistence {
    pub const TASKS_JSONL: &'static str = "tasks.jsonl";
    pub const DEPENDENCIES_JSONL: &'static str = "dependencies.jsonl";
    pub const SESSION_STATE_MD: &'static str = "SESSION_STATE.md";
    pub const DB_FILE: &'static str = "taskloom.db";

    pub fn tasks_dir_for(repo_root: &Path) -> PathBuf {
        repo_root.join(".tasks")
    }

    /// Open the persistence layer rooted at `repo_root`, creating `.tasks/`
    /// and opening (or initializing) the embedded database.
    pub async fn open(repo_root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let repo_root = repo_root.into();
        let tasks_dir = Self::tasks_dir_for(&repo_root);
        std::fs::create_dir_all(&tasks_dir)?;
        let db = Database::open(&tasks_dir.join(Self::DB_FILE)).await?;
        Ok(Self { repo_root, tasks_dir, db: Some(db) })
    }

    /// Open with no backing database — JSONL/session-state files only.
    /// Used for tests and for the headless `sync`/`export` CLI path.
    pub fn open_files_only(repo_root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let repo_root = repo_root.into();
        let tasks_dir = Self::tasks_dir_for(&repo_root);
        std::fs::create_dir_all(&tasks_dir)?;
        Ok(Self { repo_root, tasks_dir, db: None })
    }

    /// Attempt to restore a scheduler from the embedded database. Falls
    /// back to `SESSION_STATE.md` plus JSONL if the database is empty or
    /// absent, per the cold-start recovery contract.
    pub async fn restore(&self) -> Result<Option<TaskScheduler>, PersistError> {
        if let Some(db) = &self.db {
            if let Some(scheduler) = db.load_scheduler().await? {
                debug!("restored scheduler from embedded database");
                return Ok(Some(scheduler));
            }
        }
        self.restore_from_files()
    }

    fn restore_from_files(&self) -> Result<Option<TaskScheduler>, PersistError> {
        let state_path = self.tasks_dir.join(Self::SESSION_STATE_MD);
        if !state_path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&state_path)?;
        let snapshot = session_state::parse(&contents)?;

        let mut scheduler = TaskScheduler::new();
        scheduler.restore_session(snapshot.session_id, snapshot.current_task_id, chrono::Utc::now());

        let tasks_path = self.tasks_dir.join(Self::TASKS_JSONL);
        if tasks_path.exists() {
            let jsonl = std::fs::read_to_string(&tasks_path)?;
            jsonl::import_tasks(scheduler.store_mut(), &jsonl)?;
        }
        let deps_path = self.tasks_dir.join(Self::DEPENDENCIES_JSONL);
        if deps_path.exists() {
            let jsonl = std::fs::read_to_string(&deps_path)?;
            jsonl::import_dependencies(scheduler.store_mut(), &jsonl)?;
        }

        scheduler.validate_current_task();
        scheduler.adopt_orphaned_task();
        debug!("restored scheduler from SESSION_STATE.md + JSONL (no database snapshot found)");
        Ok(Some(scheduler))
    }

    /// Export tasks to `tasks.jsonl`.
    pub fn export_tasks(&self, scheduler: &TaskScheduler) -> Result<(), PersistError> {
        let data = jsonl::export_tasks(scheduler.store())?;
        std::fs::write(self.tasks_dir.join(Self::TASKS_JSONL), data)?;
        Ok(())
    }

    /// Export dependencies to `dependencies.jsonl`.
    pub fn export_dependencies(&self, scheduler: &TaskScheduler) -> Result<(), PersistError> {
        let data = jsonl::export_dependencies(scheduler.store())?;
        std::fs::write(self.tasks_dir.join(Self::DEPENDENCIES_JSONL), data)?;
        Ok(())
    }

    /// Write `SESSION_STATE.md`.
    pub fn write_session_state(&self, scheduler: &mut TaskScheduler) -> Result<(), PersistError> {
        let rendered = session_state::render(scheduler);
        std::fs::write(self.tasks_dir.join(Self::SESSION_STATE_MD), rendered)?;
        Ok(())
    }

    /// Full checkpoint: persist to the database (if present), export JSONL,
    /// write the session snapshot, then `git add && git commit` the
    /// `.tasks/` directory. A commit with nothing staged is not an error.
    pub async fn sync_all(&self, scheduler: &mut TaskScheduler) -> Result<(), PersistError> {
        if let Some(db) = &self.db {
            db.save_scheduler(scheduler).await?;
        }
        self.export_tasks(scheduler)?;
        self.export_dependencies(scheduler)?;
        self.write_session_state(scheduler)?;

        match git::commit_tasks_dir(&self.repo_root, &self.tasks_dir, "sync: task state checkpoint") {
            Ok(committed) => {
                if committed {
                    debug!("committed task state checkpoint");
                } else {
                    debug!("nothing to commit for task state checkpoint");
                }
            }
            Err(e) => warn!(error = %e, "git sync failed; JSONL and session state were still written"),
        }
        Ok(())
    }
}
