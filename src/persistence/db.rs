//! Transactional embedded relational store, backed by libSQL.
//!
//! The teacher's `TaskRepository` drives PostgreSQL through `deadpool-postgres`;
//! this core runs entirely local to the terminal harness, so the relational
//! side is an embedded libSQL database instead — same role (durable rows,
//! transactional multi-step writes), smaller footprint, no server to manage.

use libsql::Connection;

use crate::scheduler::TaskScheduler;
use crate::store::{DependencyType, Task, TaskPriority, TaskStatus, TaskType};

use super::PersistError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL,
    priority TEXT NOT NULL,
    task_type TEXT NOT NULL,
    labels TEXT NOT NULL,
    parent_id TEXT,
    blocked_by_count INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE TABLE IF NOT EXISTS dependencies (
    src TEXT NOT NULL,
    dst TEXT NOT NULL,
    dep_type TEXT NOT NULL,
    weight REAL NOT NULL,
    PRIMARY KEY (src, dst, dep_type)
);
CREATE TABLE IF NOT EXISTS comments (
    task_id TEXT NOT NULL,
    agent TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    current_task_id TEXT,
    started_at TEXT NOT NULL,
    notes TEXT
);
"#;

/// Embedded relational store. Owns a single libSQL connection; every
/// multi-statement mutation runs inside an explicit transaction so a
/// mid-write failure never leaves the database half-updated.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if absent) the database file at `path` and run the
    /// idempotent schema migration.
    pub async fn open(path: &std::path::Path) -> Result<Self, PersistError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        let conn = db.connect().map_err(|e| PersistError::Db(e.to_string()))?;
        conn.execute_batch(SCHEMA).await.map_err(|e| PersistError::Db(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Persist the full in-memory graph inside one transaction: clears and
    /// rewrites every table. Simpler and sufficiently fast at this scale
    /// than tracking per-row dirtiness, and it matches the "write the whole
    /// session snapshot" contract the git sync step already assumes. `wisp`
    /// tasks are excluded, matching `export_tasks`.
    pub async fn save_scheduler(&self, scheduler: &TaskScheduler) -> Result<(), PersistError> {
        let tx = self.conn.transaction().await.map_err(|e| PersistError::Db(e.to_string()))?;

        tx.execute("DELETE FROM comments", ()).await.map_err(|e| PersistError::Db(e.to_string()))?;
        tx.execute("DELETE FROM dependencies", ()).await.map_err(|e| PersistError::Db(e.to_string()))?;
        tx.execute("DELETE FROM tasks", ()).await.map_err(|e| PersistError::Db(e.to_string()))?;
        tx.execute("DELETE FROM sessions", ()).await.map_err(|e| PersistError::Db(e.to_string()))?;

        for task in scheduler.store().all_tasks().filter(|t| t.task_type != TaskType::Wisp) {
            tx.execute(
                "INSERT INTO tasks (id, title, description, status, priority, task_type, labels, \
                 parent_id, blocked_by_count, created_at, updated_at, completed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                libsql::params![
                    task.id.clone(),
                    task.title.clone(),
                    task.description.clone(),
                    task.status.as_str(),
                    task.priority.as_str(),
                    task_type_as_str(task.task_type),
                    serde_json::to_string(&task.labels).map_err(PersistError::Serialization)?,
                    task.parent_id.clone(),
                    task.blocked_by_count as i64,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                    task.completed_at.map(|t| t.to_rfc3339()),
                ],
            )
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;

            for comment in &task.comments {
                tx.execute(
                    "INSERT INTO comments (task_id, agent, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
                    libsql::params![
                        task.id.clone(),
                        comment.agent.clone(),
                        comment.content.clone(),
                        comment.timestamp.to_rfc3339(),
                    ],
                )
                .await
                .map_err(|e| PersistError::Db(e.to_string()))?;
            }
        }

        for dep in scheduler.store().all_dependencies() {
            tx.execute(
                "INSERT INTO dependencies (src, dst, dep_type, weight) VALUES (?1, ?2, ?3, ?4)",
                libsql::params![
                    dep.src.clone(),
                    dep.dst.clone(),
                    dep_type_as_str(dep.dep_type),
                    dep.weight,
                ],
            )
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        }

        if let Some(session) = scheduler.session() {
            tx.execute(
                "INSERT INTO sessions (session_id, current_task_id, started_at, notes) \
                 VALUES (?1, ?2, ?3, ?4)",
                libsql::params![
                    session.session_id.clone(),
                    session.current_task_id.clone(),
                    session.started_at.to_rfc3339(),
                    session.notes.clone(),
                ],
            )
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| PersistError::Db(e.to_string()))?;
        Ok(())
    }

    /// Load the most recently written session and its tasks/dependencies
    /// into a fresh scheduler. Returns `None` if the database has never
    /// been populated.
    pub async fn load_scheduler(&self) -> Result<Option<TaskScheduler>, PersistError> {
        let mut rows = self
            .conn
            .query("SELECT session_id, current_task_id, started_at, notes FROM sessions LIMIT 1", ())
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        let Some(session_row) = rows.next().await.map_err(|e| PersistError::Db(e.to_string()))? else {
            return Ok(None);
        };

        let session_id: String = session_row.get(0).map_err(|e| PersistError::Db(e.to_string()))?;
        let current_task_id: Option<String> =
            session_row.get(1).map_err(|e| PersistError::Db(e.to_string()))?;
        let started_at: String = session_row.get(2).map_err(|e| PersistError::Db(e.to_string()))?;

        let mut scheduler = TaskScheduler::new();
        scheduler.restore_session(
            session_id,
            current_task_id,
            chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| PersistError::Db(e.to_string()))?
                .with_timezone(&chrono::Utc),
        );

        let mut task_rows = self
            .conn
            .query(
                "SELECT id, title, description, status, priority, task_type, labels, parent_id, \
                 blocked_by_count, created_at, updated_at, completed_at FROM tasks",
                (),
            )
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        while let Some(row) = task_rows.next().await.map_err(|e| PersistError::Db(e.to_string()))? {
            let task = row_to_task(&row)?;
            scheduler.store_mut().insert_raw(task);
        }

        let mut comment_rows = self
            .conn
            .query("SELECT task_id, agent, content, timestamp FROM comments", ())
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        while let Some(row) = comment_rows.next().await.map_err(|e| PersistError::Db(e.to_string()))? {
            let task_id: String = row.get(0).map_err(|e| PersistError::Db(e.to_string()))?;
            let agent: String = row.get(1).map_err(|e| PersistError::Db(e.to_string()))?;
            let content: String = row.get(2).map_err(|e| PersistError::Db(e.to_string()))?;
            let timestamp: String = row.get(3).map_err(|e| PersistError::Db(e.to_string()))?;
            scheduler.store_mut().restore_comment(
                &task_id,
                crate::store::Comment { agent, content, timestamp: parse_rfc3339(&timestamp)? },
            );
        }

        let mut dep_rows = self
            .conn
            .query("SELECT src, dst, dep_type, weight FROM dependencies", ())
            .await
            .map_err(|e| PersistError::Db(e.to_string()))?;
        while let Some(row) = dep_rows.next().await.map_err(|e| PersistError::Db(e.to_string()))? {
            let src: String = row.get(0).map_err(|e| PersistError::Db(e.to_string()))?;
            let dst: String = row.get(1).map_err(|e| PersistError::Db(e.to_string()))?;
            let dep_type_str: String = row.get(2).map_err(|e| PersistError::Db(e.to_string()))?;
            let weight: f64 = row.get(3).map_err(|e| PersistError::Db(e.to_string()))?;
            scheduler.store_mut().insert_raw_dependency(crate::store::Dependency {
                src,
                dst,
                dep_type: dep_type_from_str(&dep_type_str),
                weight,
            });
        }

        Ok(Some(scheduler))
    }
}

fn row_to_task(row: &libsql::Row) -> Result<Task, PersistError> {
    let labels_json: String = row.get(6).map_err(|e| PersistError::Db(e.to_string()))?;
    Ok(Task {
        id: row.get(0).map_err(|e| PersistError::Db(e.to_string()))?,
        title: row.get(1).map_err(|e| PersistError::Db(e.to_string()))?,
        description: row.get(2).map_err(|e| PersistError::Db(e.to_string()))?,
        status: status_from_str(&row.get::<String>(3).map_err(|e| PersistError::Db(e.to_string()))?),
        priority: priority_from_str(&row.get::<String>(4).map_err(|e| PersistError::Db(e.to_string()))?),
        task_type: task_type_from_str(&row.get::<String>(5).map_err(|e| PersistError::Db(e.to_string()))?),
        labels: serde_json::from_str(&labels_json)?,
        parent_id: row.get(7).map_err(|e| PersistError::Db(e.to_string()))?,
        blocked_by_count: row.get::<i64>(8).map_err(|e| PersistError::Db(e.to_string()))? as u32,
        created_at: parse_rfc3339(&row.get::<String>(9).map_err(|e| PersistError::Db(e.to_string()))?)?,
        updated_at: parse_rfc3339(&row.get::<String>(10).map_err(|e| PersistError::Db(e.to_string()))?)?,
        completed_at: row
            .get::<Option<String>>(11)
            .map_err(|e| PersistError::Db(e.to_string()))?
            .map(|s| parse_rfc3339(&s))
            .transpose()?,
        comments: Vec::new(),
    })
}

fn parse_rfc3339(s: &str) -> Result<chrono::DateTime<chrono::Utc>, PersistError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| PersistError::Db(e.to_string()))
}

fn status_from_str(s: &str) -> TaskStatus {
    match s {
        "pending" => TaskStatus::Pending,
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "blocked" => TaskStatus::Blocked,
        "cancelled" => TaskStatus::Cancelled,
        _ => TaskStatus::Pending,
    }
}

fn priority_from_str(s: &str) -> TaskPriority {
    match s {
        "critical" => TaskPriority::Critical,
        "high" => TaskPriority::High,
        "medium" => TaskPriority::Medium,
        "low" => TaskPriority::Low,
        "wishlist" => TaskPriority::Wishlist,
        _ => TaskPriority::Medium,
    }
}

fn task_type_as_str(t: TaskType) -> &'static str {
    match t {
        TaskType::Task => "task",
        TaskType::Bug => "bug",
        TaskType::Feature => "feature",
        TaskType::Research => "research",
        TaskType::Wisp => "wisp",
        TaskType::Molecule => "molecule",
    }
}

fn task_type_from_str(s: &str) -> TaskType {
    match s {
        "bug" => TaskType::Bug,
        "feature" => TaskType::Feature,
        "research" => TaskType::Research,
        "wisp" => TaskType::Wisp,
        "molecule" => TaskType::Molecule,
        _ => TaskType::Task,
    }
}

fn dep_type_as_str(t: DependencyType) -> &'static str {
    match t {
        DependencyType::Blocks => "blocks",
        DependencyType::Parent => "parent",
        DependencyType::Related => "related",
        DependencyType::Discovered => "discovered",
    }
}

fn dep_type_from_str(s: &str) -> DependencyType {
    match s {
        "parent" => DependencyType::Parent,
        "related" => DependencyType::Related,
        "discovered" => DependencyType::Discovered,
        _ => DependencyType::Blocks,
    }
}

