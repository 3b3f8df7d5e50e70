//! Wires the subsystems into one long-lived value and exposes the two ways
//! of driving it: headless one-shot CLI subcommands, and the interactive
//! orchestrator loop. Mirrors the teacher's habit of keeping a single
//! explicit state struct at the binary boundary rather than scattering
//! globals across modules.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::agents::{bundled_definitions, AgentDefinition, AgentLoadOptions, AgentRegistry};
use crate::cli::{Command, SessionCommand, TaskCommand};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::executor::{pipeline, AgentExecutor};
use crate::llm::{LlmProvider, OllamaProvider};
use crate::orchestrator::{AgentCompletion, Orchestrator, RoutingOutcome};
use crate::persistence::Persistence;
use crate::scheduler::TaskScheduler;
use crate::store::{CreateTaskParams, TaskFilter};
use crate::tools::task_tools::{self, parse_priority, parse_status, parse_task_type};
use crate::tools::ToolRegistry;

fn lock(scheduler: &Mutex<TaskScheduler>) -> MutexGuard<'_, TaskScheduler> {
    scheduler.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Everything the binary needs for the lifetime of one run: persistence,
/// the task graph, the agent roster, the tool surface, the LLM transport,
/// and the orchestrator's queue. `scheduler` is the only piece touched from
/// more than one place (the UI loop directly, the worker indirectly through
/// tool calls), so it alone is mutex-guarded.
pub struct AppState {
    pub settings: Settings,
    scheduler: Arc<Mutex<TaskScheduler>>,
    persistence: Persistence,
    agents: AgentRegistry,
    tools: Arc<ToolRegistry>,
    provider: Arc<dyn LlmProvider>,
    orchestrator: Orchestrator,
    cancel: Arc<AtomicBool>,
}

impl AppState {
    /// Open persistence under `settings.repo_root`, restore (or start) a
    /// session, and assemble the agent roster, tool registry, and LLM
    /// transport from `settings`.
    pub async fn init(settings: Settings) -> AppResult<Self> {
        let persistence = Persistence::open(&settings.repo_root).await?;
        let mut scheduler = match persistence.restore().await? {
            Some(restored) => restored,
            None => TaskScheduler::new(),
        };
        if scheduler.session().is_none() {
            scheduler.start_session();
            scheduler.adopt_orphaned_task();
        }
        let scheduler = Arc::new(Mutex::new(scheduler));

        let mut defs: Vec<AgentDefinition> = bundled_definitions();
        if let Some(dir) = &settings.agents_dir {
            let overrides = AgentRegistry::load(&AgentLoadOptions {
                workspace_dir: Some(dir.clone()),
                ..Default::default()
            });
            for name in overrides.names() {
                if let Some(def) = overrides.get(name) {
                    defs.retain(|d| d.name != name);
                    defs.push(def.clone());
                }
            }
        }
        let agents = AgentRegistry::from_definitions(defs);

        let mut registry = ToolRegistry::new();
        task_tools::register_all(&mut registry, Arc::clone(&scheduler));

        let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(settings.ollama_base_url.clone()));

        Ok(Self {
            settings,
            scheduler,
            persistence,
            agents,
            tools: Arc::new(registry),
            provider,
            orchestrator: Orchestrator::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Signal the in-flight agent turn, if any, to stop at its next check.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Dispatch one headless subcommand against the task graph and session
    /// state, without involving any agent. Returns the text to print.
    pub async fn run_command(&mut self, command: Command) -> AppResult<String> {
        match command {
            Command::Task(TaskCommand::Create(args)) => {
                let priority = parse_priority(&args.priority)?;
                let task_type = parse_task_type(&args.task_type)?;
                let mut scheduler = lock(&self.scheduler);
                let id = scheduler.store_mut().create_task(CreateTaskParams {
                    title: args.title,
                    description: args.description,
                    priority,
                    task_type,
                    blocked_by: args.blocked_by,
                    ..Default::default()
                })?;
                Ok(format!("created task {id}"))
            }
            Command::Task(TaskCommand::List(args)) => {
                let filter = TaskFilter {
                    status: args.status.as_deref().map(parse_status).transpose()?,
                    priority: args.priority.as_deref().map(parse_priority).transpose()?,
                    ..Default::default()
                };
                let scheduler = lock(&self.scheduler);
                let mut lines: Vec<String> = scheduler
                    .store()
                    .list_tasks(&filter)
                    .into_iter()
                    .map(|t| format!("{} [{:?}/{:?}] {}", t.id, t.status, t.priority, t.title))
                    .collect();
                lines.sort();
                Ok(lines.join("\n"))
            }
            Command::Session(SessionCommand::Start) => {
                let mut scheduler = lock(&self.scheduler);
                let session_id = scheduler.start_session().session_id.clone();
                scheduler.adopt_orphaned_task();
                Ok(format!("started session {session_id}"))
            }
            Command::Sync => {
                let mut scheduler = lock(&self.scheduler);
                self.persistence.sync_all(&mut scheduler).await?;
                Ok("synced .tasks/ to disk and git".to_string())
            }
        }
    }

    /// Run the Planner/Questioner/Tinkerer/Judge loop to completion for one
    /// user-supplied goal, streaming each agent's output to stdout.
    pub async fn run_interactive(&mut self, goal: &str) -> AppResult<()> {
        self.orchestrator.start(goal);
        loop {
            match self.run_tick().await? {
                Some(RoutingOutcome::Enqueued) => continue,
                Some(RoutingOutcome::Terminated) | None => break,
            }
        }
        let mut scheduler = lock(&self.scheduler);
        self.persistence.sync_all(&mut scheduler).await?;
        Ok(())
    }

    /// Dispatch the next queued agent command, if the orchestrator isn't
    /// already running one. Spawns the turn as its own task and awaits its
    /// `JoinHandle`, which is the happens-before edge between one agent
    /// invocation and the next — `task_store`/`scheduler` are otherwise
    /// only ever touched from this loop, never from the spawned turn
    /// directly.
    async fn run_tick(&mut self) -> AppResult<Option<RoutingOutcome>> {
        let Some(cmd) = self.orchestrator.next_command() else {
            return Ok(None);
        };
        self.orchestrator.mark_running();

        let definition = self
            .agents
            .get(cmd.agent)
            .cloned()
            .ok_or_else(|| AppError::UnknownAgent(cmd.agent.to_string()))?;

        println!("\n--- {} ---", cmd.display);

        let provider = Arc::clone(&self.provider);
        let tools = Arc::clone(&self.tools);
        let model = self.settings.model.clone();
        let num_ctx = self.settings.num_ctx;
        let cancel = Arc::clone(&self.cancel);
        let prompt = cmd.prompt.clone();
        let (tx, mut rx) = pipeline::channel();

        let handle = tokio::spawn(async move {
            let mut executor = AgentExecutor::new(provider, tools, model, num_ctx);
            executor.run(&definition, &prompt, &cancel, &tx).await
        });

        while let Some(chunk) = rx.chunks.recv().await {
            if let Some(content) = &chunk.content {
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            if chunk.done {
                break;
            }
        }

        let result = handle
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e.to_string())))?;
        self.orchestrator.mark_idle();

        if !result.success {
            if let Some(msg) = &result.error_message {
                warn!(agent = cmd.agent, error = %msg, "agent turn did not complete cleanly");
            }
        }

        let mut scheduler = lock(&self.scheduler);
        let last_comment = cmd
            .task_id
            .as_ref()
            .and_then(|id| scheduler.store().get_task(id))
            .and_then(|t| t.comments.last())
            .map(|c| c.content.clone());

        let completion = AgentCompletion {
            agent: cmd.agent,
            task_id: cmd.task_id,
            success: result.success,
            last_comment,
        };
        let outcome = self.orchestrator.route(&completion, &mut scheduler);
        info!(agent = completion.agent, ?outcome, "routed agent completion");
        Ok(Some(outcome))
    }
}
