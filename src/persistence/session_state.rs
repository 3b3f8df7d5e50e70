//! Human-readable session snapshot (`SESSION_STATE.md`) with a fixed
//! section grammar, plus the reverse parser used for cold-start recovery
//! when the relational store is unavailable.

use crate::scheduler::TaskScheduler;
use crate::store::TaskId;

use super::PersistError;

/// Fields recoverable from a parsed `SESSION_STATE.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateSnapshot {
    pub session_id: String,
    pub current_task_id: Option<TaskId>,
    pub ready_count: usize,
    pub blocked_count: usize,
}

/// Render the current scheduler state as Markdown. Requires a session to
/// already be active (started or restored).
pub fn render(scheduler: &mut TaskScheduler) -> String {
    let session = scheduler.session().cloned().expect("render called without an active session");

    let mut out = String::new();
    out.push_str("# Session State\n\n");
    out.push_str(&format!("Session ID: {}\n\n", session.session_id));

    out.push_str("## Current Task\n");
    match scheduler.get_current_task() {
        Some(task) => {
            out.push_str(&format!("ID: {}\n", task.id));
            out.push_str(&format!("Title: {}\n", task.title));
            out.push_str(&format!("Status: {}\n", task.status));
        }
        None => out.push_str("(none)\n"),
    }
    out.push('\n');

    let ready = scheduler.ready_tasks();
    out.push_str(&format!("## Ready Queue ({})\n", ready.len()));
    for id in &ready {
        let task = scheduler.store().get_task(id).expect("ready id exists");
        out.push_str(&format!("- [{:?}] {}: {}\n", task.priority, task.id, task.title));
    }
    out.push('\n');

    let blocked: Vec<&crate::store::Task> = scheduler
        .store()
        .all_tasks()
        .filter(|t| t.status == crate::store::TaskStatus::Blocked)
        .collect();
    out.push_str(&format!("## Blocked ({})\n", blocked.len()));
    for task in &blocked {
        let blockers: Vec<String> =
            scheduler.store().get_blocked_by(&task.id).iter().map(|t| t.id.clone()).collect();
        out.push_str(&format!(
            "- {}: {} (blocked by: {})\n",
            task.id,
            task.title,
            blockers.join(", ")
        ));
    }
    out.push('\n');

    out.push_str("## Recently Completed\n");
    let mut completed: Vec<&crate::store::Task> = scheduler
        .store()
        .all_tasks()
        .filter(|t| t.status == crate::store::TaskStatus::Completed)
        .collect();
    completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    for task in completed.into_iter().take(10) {
        out.push_str(&format!("- {}: {}\n", task.id, task.title));
    }
    out.push('\n');

    out.push_str("## Session Notes\n");
    out.push_str(session.notes.as_deref().unwrap_or("(none)"));
    out.push('\n');

    out
}

/// Parse a previously rendered `SESSION_STATE.md`, extracting just the
/// fields needed to restore scheduler state: session id, current task id,
/// ready/blocked counts.
pub fn parse(contents: &str) -> Result<SessionStateSnapshot, PersistError> {
    let mut session_id = None;
    let mut current_task_id = None;
    let mut ready_count = None;
    let mut blocked_count = None;
    let mut in_current_task = false;

    for line in contents.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("Session ID: ") {
            session_id = Some(rest.trim().to_string());
            continue;
        }
        if line.starts_with("## Current Task") {
            in_current_task = true;
            continue;
        }
        if line.starts_with("## Ready Queue") {
            in_current_task = false;
            ready_count = extract_count(line);
            continue;
        }
        if line.starts_with("## Blocked") {
            in_current_task = false;
            blocked_count = extract_count(line);
            continue;
        }
        if line.starts_with("##") {
            in_current_task = false;
            continue;
        }
        if in_current_task {
            if let Some(rest) = line.strip_prefix("ID: ") {
                current_task_id = Some(rest.trim().to_string());
            }
        }
    }

    let session_id = session_id
        .ok_or_else(|| PersistError::InvalidFormat("missing Session ID line".to_string()))?;
    let ready_count = ready_count
        .ok_or_else(|| PersistError::InvalidFormat("missing Ready Queue section".to_string()))?;
    let blocked_count = blocked_count
        .ok_or_else(|| PersistError::InvalidFormat("missing Blocked section".to_string()))?;

    Ok(SessionStateSnapshot { session_id, current_task_id, ready_count, blocked_count })
}

fn extract_count(header: &str) -> Option<usize> {
    let open = header.rfind('(')?;
    let close = header.rfind(')')?;
    header.get(open + 1..close)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CreateTaskParams;

    #[test]
    fn render_then_parse_round_trips_headline_fields() {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let a =
            sched.store_mut().create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
        let b =
            sched.store_mut().create_task(CreateTaskParams { title: "B".into(), ..Default::default() }).unwrap();
        sched.store_mut().add_dependency(&a, &b, crate::store::DependencyType::Blocks).unwrap();
        sched.set_current_task(&a).unwrap();

        let rendered = render(&mut sched);
        let snapshot = parse(&rendered).unwrap();

        assert_eq!(snapshot.session_id, sched.session().unwrap().session_id);
        assert_eq!(snapshot.current_task_id.as_deref(), Some(a.as_str()));
        assert_eq!(snapshot.ready_count, 0);
        assert_eq!(snapshot.blocked_count, 1);
    }
}
