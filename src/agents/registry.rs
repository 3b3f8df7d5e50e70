//! Agent definition discovery and loading.
//!
//! Mirrors `skills::loader`'s multi-source precedence merge (later source
//! wins on name collision, sorted by name for deterministic iteration),
//! applied to `*.md` agent definitions instead of `SKILL.md` skill bundles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::frontmatter::parse;

/// A loaded agent definition: capabilities plus the system prompt body.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    pub max_iterations: u32,
    pub conversation_mode: bool,
    pub system_prompt: String,
    pub source: String,
}

/// Errors raised while loading an individual agent definition.
#[derive(Debug, thiserror::Error)]
pub enum AgentLoadError {
    #[error("missing required 'name' field in {0}")]
    MissingName(PathBuf),

    #[error("missing required 'description' field in {0}")]
    MissingDescription(PathBuf),

    #[error("empty system prompt body in {0}")]
    EmptyBody(PathBuf),
}

const DEFAULT_MAX_ITERATIONS: u32 = 8;

fn parse_definition(path: &Path, source: &str) -> Result<AgentDefinition, AgentLoadError> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let (fm, body) = parse(&content);

    let name = fm.get("name").cloned().ok_or_else(|| AgentLoadError::MissingName(path.to_path_buf()))?;
    let description = fm
        .get("description")
        .cloned()
        .ok_or_else(|| AgentLoadError::MissingDescription(path.to_path_buf()))?;
    if body.trim().is_empty() {
        return Err(AgentLoadError::EmptyBody(path.to_path_buf()));
    }

    let tools = fm
        .get("tools")
        .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
        .unwrap_or_default();

    let max_iterations = fm
        .get("max_iterations")
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_MAX_ITERATIONS);

    let conversation_mode = fm
        .get("conversation_mode")
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    Ok(AgentDefinition {
        name,
        description,
        tools,
        max_iterations,
        conversation_mode,
        system_prompt: body.trim().to_string(),
        source: source.to_string(),
    })
}

fn load_dir(dir: &Path, source: &str) -> Vec<AgentDefinition> {
    let mut defs = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return defs;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        match parse_definition(&path, source) {
            Ok(def) => defs.push(def),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid agent definition"),
        }
    }
    defs
}

/// Where to look for agent definitions, in ascending precedence order.
#[derive(Debug, Clone, Default)]
pub struct AgentLoadOptions {
    pub bundled_dir: Option<PathBuf>,
    pub managed_dir: Option<PathBuf>,
    pub workspace_dir: Option<PathBuf>,
    /// If non-empty, only these bundled agent names are loaded.
    pub bundled_allowlist: Vec<String>,
}

/// Name → definition map, later source wins, iterated in sorted order.
pub struct AgentRegistry {
    agents: HashMap<String, AgentDefinition>,
}

impl AgentRegistry {
    /// Load from bundled, then user-managed (`~/.config/taskloom/agents/`),
    /// then workspace-local directories, merging on name with later
    /// sources winning.
    pub fn load(opts: &AgentLoadOptions) -> Self {
        let mut merged: HashMap<String, AgentDefinition> = HashMap::new();

        if let Some(dir) = &opts.bundled_dir {
            for def in load_dir(dir, "bundled") {
                if !opts.bundled_allowlist.is_empty() && !opts.bundled_allowlist.contains(&def.name) {
                    continue;
                }
                merged.insert(def.name.clone(), def);
            }
        }
        if let Some(dir) = &opts.managed_dir {
            for def in load_dir(dir, "managed") {
                merged.insert(def.name.clone(), def);
            }
        }
        if let Some(dir) = &opts.workspace_dir {
            for def in load_dir(dir, "workspace") {
                merged.insert(def.name.clone(), def);
            }
        }

        debug!(count = merged.len(), "loaded agent definitions");
        Self { agents: merged }
    }

    /// Construct directly from a fixed set of definitions (used for the
    /// bundled defaults compiled into the binary, and in tests).
    pub fn from_definitions(defs: impl IntoIterator<Item = AgentDefinition>) -> Self {
        Self { agents: defs.into_iter().map(|d| (d.name.clone(), d)).collect() }
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The four bundled agent definitions, embedded at compile time so the
/// harness always has a working default set even with no config directory
/// present.
pub fn bundled_definitions() -> Vec<AgentDefinition> {
    const PLANNER: &str = include_str!("builtin/planner.md");
    const QUESTIONER: &str = include_str!("builtin/questioner.md");
    const TINKERER: &str = include_str!("builtin/tinkerer.md");
    const JUDGE: &str = include_str!("builtin/judge.md");

    [PLANNER, QUESTIONER, TINKERER, JUDGE]
        .iter()
        .filter_map(|content| {
            let (fm, body) = parse(content);
            Some(AgentDefinition {
                name: fm.get("name")?.clone(),
                description: fm.get("description")?.clone(),
                tools: fm
                    .get("tools")
                    .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
                    .unwrap_or_default(),
                max_iterations: fm
                    .get("max_iterations")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(DEFAULT_MAX_ITERATIONS),
                conversation_mode: fm
                    .get("conversation_mode")
                    .map(|s| s.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                system_prompt: body.trim().to_string(),
                source: "bundled".to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_definitions_parse_cleanly() {
        let defs = bundled_definitions();
        assert_eq!(defs.len(), 4);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"planner"));
        assert!(names.contains(&"questioner"));
        assert!(names.contains(&"tinkerer"));
        assert!(names.contains(&"judge"));
    }

    #[test]
    fn workspace_dir_overrides_bundled_on_name_collision() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("planner.md"),
            "---\nname: planner\ndescription: override\n---\nOverridden prompt.\n",
        )
        .unwrap();

        let registry = AgentRegistry::load(&AgentLoadOptions {
            workspace_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        });
        assert_eq!(registry.get("planner").unwrap().description, "override");
    }
}
