//! Session tracking and current-task election on top of [`TaskStore`].
//!
//! Where the store answers "what dependency state is the graph in", the
//! scheduler answers "what should run right now" — mirroring the split
//! between `agent_tasks` and the `agent_tasks_ready` view in the teacher's
//! repository, but folded into a single in-process type since there is no
//! database view to lean on here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{StoreError, TaskId, TaskStatus, TaskStore, TaskType};

/// A single run of the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub current_task_id: Option<TaskId>,
    pub started_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Session {
    fn new() -> Self {
        let ts = Utc::now();
        let suffix = &Uuid::new_v4().simple().to_string()[..4];
        Self {
            session_id: format!("{}-{}", ts.timestamp(), suffix),
            current_task_id: None,
            started_at: ts,
            notes: None,
        }
    }
}

/// Errors raised while electing or validating the current task.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("molecule tasks cannot be set as the current task")]
    CannotSetMoleculeAsCurrent,

    #[error("task is not startable: {0}")]
    TaskNotStartable(TaskId),

    #[error("no session is active")]
    NoActiveSession,
}

/// Wraps a [`TaskStore`] with session state and current-task election.
pub struct TaskScheduler {
    store: TaskStore,
    session: Option<Session>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self { store: TaskStore::new(), session: None }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore {
        &mut self.store
    }

    pub fn start_session(&mut self) -> &Session {
        self.session = Some(Session::new());
        self.session.as_ref().expect("just set")
    }

    pub fn restore_session(
        &mut self,
        session_id: String,
        current_task_id: Option<TaskId>,
        started_at: DateTime<Utc>,
    ) {
        self.session = Some(Session { session_id, current_task_id, started_at, notes: None });
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn is_startable(&self, task_id: &str) -> Result<(), SchedulerError> {
        let task = self
            .store
            .get_task(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
        if task.task_type == TaskType::Molecule {
            return Err(SchedulerError::CannotSetMoleculeAsCurrent);
        }
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
            return Err(SchedulerError::TaskNotStartable(task_id.to_string()));
        }
        Ok(())
    }

    /// Elect `task_id` as the current task. Flips a `pending` task to
    /// `in_progress`. Rejects molecules and tasks that are not workable.
    pub fn set_current_task(&mut self, task_id: &str) -> Result<(), SchedulerError> {
        self.is_startable(task_id)?;
        if self.session.is_none() {
            return Err(SchedulerError::NoActiveSession);
        }

        let status = self.store.get_task(task_id).expect("checked by is_startable").status;
        if status == TaskStatus::Pending {
            self.store
                .update_status(task_id, TaskStatus::InProgress)
                .map_err(SchedulerError::Store)?;
        }
        self.session.as_mut().expect("checked above").current_task_id = Some(task_id.to_string());
        Ok(())
    }

    /// Pure query: the current task, if it still refers to a workable,
    /// non-molecule task.
    pub fn get_current_task(&self) -> Option<&crate::store::Task> {
        let id = self.session.as_ref()?.current_task_id.as_ref()?;
        let task = self.store.get_task(id)?;
        if task.task_type == TaskType::Molecule {
            return None;
        }
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
            return None;
        }
        Some(task)
    }

    /// Clears `current_task_id` if it no longer refers to a valid task.
    pub fn validate_current_task(&mut self) {
        let still_valid = self.get_current_task().is_some();
        if !still_valid {
            if let Some(session) = self.session.as_mut() {
                session.current_task_id = None;
            }
        }
    }

    /// If no current task is set, promote the first `in_progress`,
    /// non-molecule task found — recovery after an unclean restart.
    pub fn adopt_orphaned_task(&mut self) {
        if self.session.as_ref().and_then(|s| s.current_task_id.as_ref()).is_some() {
            return;
        }
        let orphan = self
            .store
            .all_tasks()
            .find(|t| t.status == TaskStatus::InProgress && t.task_type != TaskType::Molecule)
            .map(|t| t.id.clone());
        if let (Some(orphan), Some(session)) = (orphan, self.session.as_mut()) {
            session.current_task_id = Some(orphan);
        }
    }

    pub fn would_create_cycle(&self, src: &str, dst: &str) -> bool {
        self.store.would_create_cycle(src, dst)
    }

    /// Ready tasks in election order: ascending priority, then creation
    /// time.
    pub fn ready_tasks(&mut self) -> Vec<TaskId> {
        self.store.get_ready_tasks().into_iter().map(|t| t.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CreateTaskParams;

    #[test]
    fn election_flips_pending_to_in_progress() {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let id = sched
            .store_mut()
            .create_task(CreateTaskParams { title: "A".into(), ..Default::default() })
            .unwrap();
        sched.set_current_task(&id).unwrap();
        assert_eq!(sched.store().get_task(&id).unwrap().status, TaskStatus::InProgress);
        assert_eq!(sched.get_current_task().unwrap().id, id);
    }

    #[test]
    fn molecule_cannot_become_current() {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let id = sched
            .store_mut()
            .create_task(CreateTaskParams {
                title: "epic".into(),
                task_type: TaskType::Molecule,
                ..Default::default()
            })
            .unwrap();
        let err = sched.set_current_task(&id).unwrap_err();
        assert!(matches!(err, SchedulerError::CannotSetMoleculeAsCurrent));
    }

    #[test]
    fn orphan_adoption_recovers_in_progress_task() {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let id = sched
            .store_mut()
            .create_task(CreateTaskParams { title: "A".into(), ..Default::default() })
            .unwrap();
        sched.set_current_task(&id).unwrap();
        // Simulate a cold-start restore with no current task recorded.
        sched.restore_session("1-0001".into(), None, Utc::now());
        sched.adopt_orphaned_task();
        assert_eq!(sched.get_current_task().unwrap().id, id);
    }

    #[test]
    fn validate_clears_stale_reference() {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let id = sched
            .store_mut()
            .create_task(CreateTaskParams { title: "A".into(), ..Default::default() })
            .unwrap();
        sched.set_current_task(&id).unwrap();
        sched.store_mut().complete_task(&id).unwrap();
        sched.validate_current_task();
        assert!(sched.get_current_task().is_none());
    }
}
