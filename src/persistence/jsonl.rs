//! JSONL export/import, grounded in `workspace/tasks.rs::export_jsonl` /
//! `import_jsonl` — same one-object-per-line shape, adapted to the
//! synchronous in-memory [`TaskStore`] and its `Wisp` exclusion rule.

use serde::{Deserialize, Serialize};

use crate::store::{Dependency, DependencyType, Task, TaskStore, TaskType};

use super::PersistError;

#[derive(Debug, Serialize, Deserialize)]
struct DependencyRecord {
    src: String,
    dst: String,
    #[serde(rename = "type")]
    dep_type: DependencyType,
    weight: f64,
}

/// Serialize every non-wisp task to one compact JSON object per line.
pub fn export_tasks(store: &TaskStore) -> Result<String, PersistError> {
    let mut lines = Vec::new();
    for task in store.all_tasks().filter(|t| t.task_type != TaskType::Wisp) {
        lines.push(serde_json::to_string(task)?);
    }
    Ok(lines.join("\n"))
}

/// Serialize every dependency edge to one compact JSON object per line.
pub fn export_dependencies(store: &TaskStore) -> Result<String, PersistError> {
    let mut lines = Vec::new();
    for dep in store.all_dependencies() {
        let record = DependencyRecord {
            src: dep.src.clone(),
            dst: dep.dst.clone(),
            dep_type: dep.dep_type,
            weight: dep.weight,
        };
        lines.push(serde_json::to_string(&record)?);
    }
    Ok(lines.join("\n"))
}

/// Import tasks, skipping any whose id already exists (collision-tolerant).
/// Returns the number of tasks actually inserted.
pub fn import_tasks(store: &mut TaskStore, jsonl: &str) -> Result<usize, PersistError> {
    let mut count = 0;
    for line in jsonl.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let task: Task = serde_json::from_str(line)?;
        if store.insert_raw(task) {
            count += 1;
        }
    }
    Ok(count)
}

/// Import dependency edges, skipping edges whose endpoints are missing.
/// `blocked_by_count` is recomputed as each edge is inserted, so import
/// order does not matter. Returns the number of edges actually inserted.
pub fn import_dependencies(store: &mut TaskStore, jsonl: &str) -> Result<usize, PersistError> {
    let mut count = 0;
    for line in jsonl.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: DependencyRecord = serde_json::from_str(line)?;
        if !store.contains(&record.src) || !store.contains(&record.dst) {
            continue;
        }
        store.insert_raw_dependency(Dependency {
            src: record.src,
            dst: record.dst,
            dep_type: record.dep_type,
            weight: record.weight,
        });
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateTaskParams, DependencyType as DT};

    #[test]
    fn round_trips_tasks_and_dependencies() {
        let mut store = TaskStore::new();
        let a = store.create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
        let b = store.create_task(CreateTaskParams { title: "B".into(), ..Default::default() }).unwrap();
        store.add_dependency(&a, &b, DT::Blocks).unwrap();

        let tasks_jsonl = export_tasks(&store).unwrap();
        let deps_jsonl = export_dependencies(&store).unwrap();

        let mut restored = TaskStore::new();
        let n_tasks = import_tasks(&mut restored, &tasks_jsonl).unwrap();
        let n_deps = import_dependencies(&mut restored, &deps_jsonl).unwrap();
        assert_eq!(n_tasks, 2);
        assert_eq!(n_deps, 1);
        assert_eq!(restored.get_task(&b).unwrap().blocked_by_count, 1);
    }

    #[test]
    fn wisp_tasks_are_excluded_from_export() {
        let mut store = TaskStore::new();
        store
            .create_task(CreateTaskParams {
                title: "ephemeral".into(),
                task_type: TaskType::Wisp,
                ..Default::default()
            })
            .unwrap();
        let jsonl = export_tasks(&store).unwrap();
        assert!(jsonl.is_empty());
    }

    #[test]
    fn import_is_collision_tolerant() {
        let mut store = TaskStore::new();
        let a = store.create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
        let jsonl = export_tasks(&store).unwrap();
        // Re-importing into the same store must not duplicate or error.
        let n = import_tasks(&mut store, &jsonl).unwrap();
        assert_eq!(n, 0);
        assert!(store.contains(&a));
    }
}
