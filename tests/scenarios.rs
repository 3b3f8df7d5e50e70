//! End-to-end scenarios spanning more than one module: a linear dependency
//! chain unblocking in order, cycle rejection surfacing through the
//! scheduler (not just the store), cold-start recovery from the on-disk
//! `.tasks/` layout, and a full orchestrator loop through a kickback and a
//! judge revision.

use taskloom::agents;
use taskloom::orchestrator::{AgentCompletion, Orchestrator, RoutingOutcome};
use taskloom::persistence::Persistence;
use taskloom::scheduler::TaskScheduler;
use taskloom::store::{CreateTaskParams, DependencyType, TaskStatus};

#[test]
fn linear_chain_unblocks_one_task_at_a_time() {
    let mut sched = TaskScheduler::new();
    sched.start_session();

    let a = sched.store_mut().create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
    let b = sched
        .store_mut()
        .create_task(CreateTaskParams { title: "B".into(), blocked_by: vec![a.clone()], ..Default::default() })
        .unwrap();
    let c = sched
        .store_mut()
        .create_task(CreateTaskParams { title: "C".into(), blocked_by: vec![b.clone()], ..Default::default() })
        .unwrap();

    assert_eq!(sched.ready_tasks(), vec![a.clone()]);

    sched.store_mut().complete_task(&a).unwrap();
    assert_eq!(sched.ready_tasks(), vec![b.clone()]);
    assert_eq!(sched.store().get_task(&c).unwrap().status, TaskStatus::Blocked);

    sched.store_mut().complete_task(&b).unwrap();
    assert_eq!(sched.ready_tasks(), vec![c.clone()]);
}

#[test]
fn scheduler_refuses_to_let_a_dependency_cycle_form() {
    let mut sched = TaskScheduler::new();
    sched.start_session();

    let a = sched.store_mut().create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
    let b = sched
        .store_mut()
        .create_task(CreateTaskParams { title: "B".into(), blocked_by: vec![a.clone()], ..Default::default() })
        .unwrap();

    // B already depends on A; routing a `Blocks` edge back from B to A would cycle.
    assert!(sched.would_create_cycle(&b, &a));
    let err = sched.store_mut().add_dependency(&b, &a, DependencyType::Blocks).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[tokio::test]
async fn cold_start_recovers_the_task_graph_from_session_state_and_jsonl() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let a = sched.store_mut().create_task(CreateTaskParams { title: "A".into(), ..Default::default() }).unwrap();
        sched.set_current_task(&a).unwrap();

        let persistence = Persistence::open_files_only(dir.path()).unwrap();
        persistence.export_tasks(&sched).unwrap();
        persistence.export_dependencies(&sched).unwrap();
        persistence.write_session_state(&mut sched).unwrap();
    }

    let persistence = Persistence::open_files_only(dir.path()).unwrap();
    let restored = persistence.restore().await.unwrap().expect("session state should be found");
    assert!(restored.session().is_some());
    assert_eq!(restored.store().all_tasks().count(), 1);
}

#[test]
fn orchestrator_drives_a_kickback_then_a_judge_revision_to_completion() {
    let mut orch = Orchestrator::new();
    let mut sched = TaskScheduler::new();
    sched.start_session();
    let blocker = sched.store_mut().create_task(CreateTaskParams { title: "blocker".into(), ..Default::default() }).unwrap();
    let work = sched
        .store_mut()
        .create_task(CreateTaskParams { title: "work".into(), blocked_by: vec![blocker.clone()], ..Default::default() })
        .unwrap();
    sched.store_mut().add_comment(&work, "questioner", "BLOCKED: blocker is too vague").unwrap();

    orch.start("ship the feature");
    let plan = orch.next_command().unwrap();
    assert_eq!(plan.agent, agents::PLANNER);

    // Planner completes -> Questioner queued.
    let outcome = orch.route(
        &AgentCompletion { agent: agents::PLANNER, task_id: None, success: true, last_comment: None },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let questioning = orch.next_command().unwrap();
    assert_eq!(questioning.agent, agents::QUESTIONER);

    // Questioner sees the blocked task and nothing ready -> kickback to Planner.
    let outcome = orch.route(
        &AgentCompletion { agent: agents::QUESTIONER, task_id: Some(work.clone()), success: true, last_comment: None },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let replanning = orch.next_command().unwrap();
    assert_eq!(replanning.agent, agents::PLANNER);
    assert!(replanning.prompt.contains("blocker is too vague"));

    // Planner unblocks `work` by completing the blocker.
    sched.store_mut().complete_task(&blocker).unwrap();
    assert_eq!(sched.store().get_task(&work).unwrap().status, TaskStatus::Pending);

    let outcome = orch.route(
        &AgentCompletion { agent: agents::PLANNER, task_id: None, success: true, last_comment: None },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let questioning_again = orch.next_command().unwrap();
    assert_eq!(questioning_again.agent, agents::QUESTIONER);

    // Questioner now finds a ready task -> Tinkerer.
    let outcome = orch.route(
        &AgentCompletion { agent: agents::QUESTIONER, task_id: None, success: true, last_comment: None },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let tinkering = orch.next_command().unwrap();
    assert_eq!(tinkering.agent, agents::TINKERER);
    assert_eq!(tinkering.task_id, Some(work.clone()));

    // Tinkerer finishes with nothing blocked -> Judge.
    let outcome = orch.route(
        &AgentCompletion { agent: agents::TINKERER, task_id: Some(work.clone()), success: true, last_comment: None },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let judging = orch.next_command().unwrap();
    assert_eq!(judging.agent, agents::JUDGE);

    // Judge rejects -> Tinkerer revises.
    let outcome = orch.route(
        &AgentCompletion {
            agent: agents::JUDGE,
            task_id: Some(work.clone()),
            success: true,
            last_comment: Some("REJECTED: no tests".to_string()),
        },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Enqueued);
    let revising = orch.next_command().unwrap();
    assert_eq!(revising.agent, agents::TINKERER);
    assert!(revising.prompt.contains("no tests"));

    // Tinkerer revises, Judge approves, nothing left ready -> terminate.
    sched.store_mut().complete_task(&work).unwrap();
    let outcome = orch.route(
        &AgentCompletion {
            agent: agents::JUDGE,
            task_id: Some(work),
            success: true,
            last_comment: Some("APPROVED: looks good".to_string()),
        },
        &mut sched,
    );
    assert_eq!(outcome, RoutingOutcome::Terminated);
}
