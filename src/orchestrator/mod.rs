//! Control plane: routes completed agent turns to the next agent to run.
//!
//! Modeled on the task status transitions in [`crate::store`] (an explicit
//! enum-driven state machine rather than callbacks), but the event queue
//! itself has no teacher analogue — it exists to keep agent dispatch
//! non-recursive, per the design notes this core is built against.

use std::collections::VecDeque;

use crate::agents;
use crate::scheduler::TaskScheduler;
use crate::store::TaskId;

/// One pending agent invocation.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub agent: &'static str,
    pub task_id: Option<TaskId>,
    pub prompt: String,
    pub display: String,
}

impl AgentCommand {
    fn new(agent: &'static str, task_id: Option<TaskId>, prompt: impl Into<String>, display: impl Into<String>) -> Self {
        Self { agent, task_id, prompt: prompt.into(), display: display.into() }
    }
}

/// What an [`AgentCommand`] produced, as reported back by the executor.
#[derive(Debug, Clone)]
pub struct AgentCompletion {
    pub agent: &'static str,
    pub task_id: Option<TaskId>,
    pub success: bool,
    /// Content of the most recent comment the agent left on `task_id`, if
    /// any — the routing table reads `BLOCKED:`/`REJECTED:`/`APPROVED:`
    /// prefixes off this.
    pub last_comment: Option<String>,
}

/// Outcome of a routing decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingOutcome {
    Enqueued,
    Terminated,
}

/// FIFO dispatcher over [`AgentCommand`]s. Agents never invoke each other
/// directly; all hand-off goes through this queue so a failing agent can't
/// recursively corrupt the call stack.
#[derive(Default)]
pub struct Orchestrator {
    queue: VecDeque<AgentCommand>,
    running: bool,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self { queue: VecDeque::new(), running: false }
    }

    pub fn is_idle(&self) -> bool {
        !self.running
    }

    fn enqueue(&mut self, cmd: AgentCommand) {
        self.queue.push_back(cmd);
    }

    /// Seed the loop with an initial Planner invocation.
    pub fn start(&mut self, prompt: impl Into<String>) {
        self.enqueue(AgentCommand::new(agents::PLANNER, None, prompt, "planning"));
    }

    /// Main-loop tick: if nothing is running, pop and return the next
    /// command to dispatch. Caller is responsible for marking `running`
    /// via [`Self::mark_running`] / [`Self::mark_idle`] around the actual
    /// executor invocation.
    pub fn next_command(&mut self) -> Option<AgentCommand> {
        if self.running {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn mark_running(&mut self) {
        self.running = true;
    }

    pub fn mark_idle(&mut self) {
        self.running = false;
    }

    /// Apply the routing table for one completed agent invocation.
    pub fn route(&mut self, completion: &AgentCompletion, scheduler: &mut TaskScheduler) -> RoutingOutcome {
        if !completion.success {
            return RoutingOutcome::Terminated;
        }

        match completion.agent {
            name if name == agents::PLANNER => {
                self.enqueue(AgentCommand::new(agents::QUESTIONER, None, "", "questioning"));
                RoutingOutcome::Enqueued
            }
            name if name == agents::QUESTIONER => self.route_after_questioner(scheduler),
            name if name == agents::TINKERER => self.route_after_tinkerer(scheduler),
            name if name == agents::JUDGE => self.route_after_judge(completion, scheduler),
            _ => RoutingOutcome::Terminated,
        }
    }

    fn route_after_questioner(&mut self, scheduler: &mut TaskScheduler) -> RoutingOutcome {
        let ready = scheduler.ready_tasks();
        let any_blocked = scheduler
            .store()
            .list_tasks(&crate::store::TaskFilter {
                status: Some(crate::store::TaskStatus::Blocked),
                ..Default::default()
            })
            .len()
            > 0;

        if any_blocked && ready.is_empty() {
            let prompt = synthesize_kickback_prompt(scheduler);
            self.enqueue(AgentCommand::new(agents::PLANNER, None, prompt, "replanning"));
            RoutingOutcome::Enqueued
        } else if !ready.is_empty() {
            self.enqueue(AgentCommand::new(agents::TINKERER, ready.first().cloned(), "", "working"));
            RoutingOutcome::Enqueued
        } else {
            RoutingOutcome::Terminated
        }
    }

    fn route_after_tinkerer(&mut self, scheduler: &mut TaskScheduler) -> RoutingOutcome {
        let any_blocked = scheduler
            .store()
            .list_tasks(&crate::store::TaskFilter {
                status: Some(crate::store::TaskStatus::Blocked),
                ..Default::default()
            })
            .len()
            > 0;

        if any_blocked {
            let prompt = synthesize_kickback_prompt(scheduler);
            self.enqueue(AgentCommand::new(agents::PLANNER, None, prompt, "replanning"));
        } else {
            self.enqueue(AgentCommand::new(agents::JUDGE, None, "", "judging"));
        }
        RoutingOutcome::Enqueued
    }

    fn route_after_judge(&mut self, completion: &AgentCompletion, scheduler: &mut TaskScheduler) -> RoutingOutcome {
        if let Some(comment) = &completion.last_comment {
            if let Some(reason) = comment.strip_prefix("REJECTED:") {
                let prompt = format!("REVISION: {}", reason.trim());
                self.enqueue(AgentCommand::new(agents::TINKERER, completion.task_id.clone(), prompt, "revising"));
                return RoutingOutcome::Enqueued;
            }
        }

        if !scheduler.ready_tasks().is_empty() {
            self.enqueue(AgentCommand::new(agents::QUESTIONER, None, "", "questioning"));
            RoutingOutcome::Enqueued
        } else {
            RoutingOutcome::Terminated
        }
    }
}

/// Build a single instruction for the Planner out of every task currently
/// `blocked` with a `BLOCKED:` comment, one reason per line.
fn synthesize_kickback_prompt(scheduler: &mut TaskScheduler) -> String {
    let blocked_with_reason = scheduler.store().get_tasks_with_comment_prefix("BLOCKED:");
    let mut lines = Vec::new();
    for task in blocked_with_reason {
        if task.status != crate::store::TaskStatus::Blocked {
            continue;
        }
        if let Some(comment) = task.comments.iter().rev().find(|c| c.content.starts_with("BLOCKED:")) {
            lines.push(format!("- {} ({}): {}", task.id, task.title, comment.content));
        }
    }
    if lines.is_empty() {
        "Re-plan the current work; a downstream agent could not proceed.".to_string()
    } else {
        format!("Re-plan the following blocked tasks:\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CreateTaskParams, DependencyType, TaskPriority, TaskStatus};

    fn sched_with_task(title: &str) -> (TaskScheduler, TaskId) {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let id = sched
            .store_mut()
            .create_task(CreateTaskParams { title: title.to_string(), ..Default::default() })
            .unwrap();
        (sched, id)
    }

    #[test]
    fn planner_completion_enqueues_questioner() {
        let mut orch = Orchestrator::new();
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let completion =
            AgentCompletion { agent: agents::PLANNER, task_id: None, success: true, last_comment: None };
        assert_eq!(orch.route(&completion, &mut sched), RoutingOutcome::Enqueued);
        assert_eq!(orch.next_command().unwrap().agent, agents::QUESTIONER);
    }

    #[test]
    fn questioner_kickback_on_blocked_with_no_ready() {
        let mut orch = Orchestrator::new();
        let (mut sched, id) = sched_with_task("Refactor auth");
        sched.store_mut().update_priority(&id, TaskPriority::Medium).unwrap();
        sched.store_mut().add_comment(&id, "questioner", "BLOCKED: too broad").unwrap();
        // Force the task into blocked status directly, as the questioner would via task_update.
        let other = sched
            .store_mut()
            .create_task(CreateTaskParams { title: "blocker".into(), ..Default::default() })
            .unwrap();
        sched.store_mut().add_dependency(&other, &id, DependencyType::Blocks).unwrap();
        assert_eq!(sched.store().get_task(&id).unwrap().status, TaskStatus::Blocked);

        let completion =
            AgentCompletion { agent: agents::QUESTIONER, task_id: Some(id.clone()), success: true, last_comment: None };
        assert_eq!(orch.route(&completion, &mut sched), RoutingOutcome::Enqueued);
        let cmd = orch.next_command().unwrap();
        assert_eq!(cmd.agent, agents::PLANNER);
        assert!(cmd.prompt.contains("too broad"));
    }

    #[test]
    fn judge_rejection_routes_to_tinkerer_with_revision_prompt() {
        let mut orch = Orchestrator::new();
        let (mut sched, id) = sched_with_task("A");
        let completion = AgentCompletion {
            agent: agents::JUDGE,
            task_id: Some(id),
            success: true,
            last_comment: Some("REJECTED: missing tests".to_string()),
        };
        assert_eq!(orch.route(&completion, &mut sched), RoutingOutcome::Enqueued);
        let cmd = orch.next_command().unwrap();
        assert_eq!(cmd.agent, agents::TINKERER);
        assert!(cmd.prompt.starts_with("REVISION:"));
        assert!(cmd.prompt.contains("missing tests"));
    }

    #[test]
    fn judge_approval_with_no_ready_tasks_terminates() {
        let mut orch = Orchestrator::new();
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let completion = AgentCompletion {
            agent: agents::JUDGE,
            task_id: None,
            success: true,
            last_comment: Some("APPROVED: looks good".to_string()),
        };
        assert_eq!(orch.route(&completion, &mut sched), RoutingOutcome::Terminated);
    }

    #[test]
    fn failed_agent_terminates_its_branch() {
        let mut orch = Orchestrator::new();
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let completion =
            AgentCompletion { agent: agents::TINKERER, task_id: None, success: false, last_comment: None };
        assert_eq!(orch.route(&completion, &mut sched), RoutingOutcome::Terminated);
    }
}
