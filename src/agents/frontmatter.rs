//! Agent definition frontmatter parsing — the same `---`-delimited
//! line-based YAML subset `skills::frontmatter` parses for `SKILL.md`,
//! applied to agent definitions instead (`name`, `description`, `tools`,
//! `max_iterations`, `conversation_mode`).

use std::collections::HashMap;

/// Raw frontmatter key-value pairs.
pub type RawFrontmatter = HashMap<String, String>;

/// Split `content` into its frontmatter block and body. Returns an empty
/// map and the full content unchanged if no `---`-delimited block is
/// found at the top of the file.
pub fn parse(content: &str) -> (RawFrontmatter, &str) {
    let trimmed = content.trim_start();
    if !trimmed.starts_with("---") {
        return (RawFrontmatter::new(), content);
    }

    let after_first = &trimmed[3..];
    let rest = after_first.trim_start_matches(['\r', '\n']);
    let Some(closing_pos) = rest.find("\n---") else {
        return (RawFrontmatter::new(), content);
    };

    let yaml_block = &rest[..closing_pos];
    let body_start = closing_pos + 4;
    let body = rest[body_start..].trim_start_matches(['\r', '\n']);
    (parse_yaml_block(yaml_block), body)
}

fn parse_yaml_block(yaml: &str) -> RawFrontmatter {
    let mut map = RawFrontmatter::new();
    let mut current_key: Option<String> = None;
    let mut current_value = String::new();

    for line in yaml.lines() {
        if !line.starts_with(' ') && !line.starts_with('\t') {
            if let Some(ref key) = current_key {
                let val = current_value.trim().to_string();
                if !val.is_empty() {
                    map.insert(key.clone(), strip_quotes(&val));
                }
            }
            if let Some(colon_pos) = line.find(':') {
                current_key = Some(line[..colon_pos].trim().to_string());
                current_value = line[colon_pos + 1..].trim().to_string();
            } else {
                current_key = None;
                current_value.clear();
            }
        } else if current_key.is_some() {
            current_value.push('\n');
            current_value.push_str(line);
        }
    }

    if let Some(ref key) = current_key {
        let val = current_value.trim().to_string();
        if !val.is_empty() {
            map.insert(key.clone(), strip_quotes(&val));
        }
    }
    map
}

fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_frontmatter_and_body() {
        let content = "---\nname: planner\ndescription: Breaks down work\ntools: task_create, task_list\nmax_iterations: 6\nconversation_mode: false\n---\nYou are the planner.\n";
        let (fm, body) = parse(content);
        assert_eq!(fm.get("name").unwrap(), "planner");
        assert_eq!(fm.get("tools").unwrap(), "task_create, task_list");
        assert_eq!(body.trim(), "You are the planner.");
    }

    #[test]
    fn missing_frontmatter_returns_empty_map() {
        let (fm, body) = parse("Just a prompt, no frontmatter.");
        assert!(fm.is_empty());
        assert_eq!(body, "Just a prompt, no frontmatter.");
    }
}
