//! Custom markdown command templates: user-global under `~/bmo/data/commands`,
//! overridable per-project under `<working_dir>/.bmo/commands`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn user_commands_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("bmo").join("data").join("commands")
}

fn project_commands_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".bmo").join("commands")
}

fn command_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// Discover commands, with project-local commands overriding user-global
/// ones of the same name.
pub fn discover_commands(working_dir: &Path) -> HashMap<String, PathBuf> {
    let mut commands = HashMap::new();

    if let Ok(entries) = std::fs::read_dir(user_commands_dir()) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                commands.insert(command_name(&path), path);
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(project_commands_dir(working_dir)) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("md") {
                commands.insert(command_name(&path), path);
            }
        }
    }

    commands
}

/// Load a command template, substituting the literal `$ARGUMENTS` token.
pub fn load_command(file_path: &Path, arguments: &str) -> std::io::Result<String> {
    let contents = std::fs::read_to_string(file_path)?;
    Ok(contents.replace("$ARGUMENTS", arguments.trim()).trim().to_string())
}

pub struct CommandInfo {
    pub name: String,
    pub source: &'static str,
    pub preview: String,
}

/// Sorted command list with a source tag and a one-line preview (skipping
/// a single leading HTML-comment line, truncated to 80 chars).
pub fn list_commands(working_dir: &Path) -> Vec<CommandInfo> {
    let project_dir = project_commands_dir(working_dir);
    let mut commands = discover_commands(working_dir)
        .into_iter()
        .map(|(name, path)| {
            let source = if path.starts_with(&project_dir) { "project" } else { "user" };
            let preview = preview_for(&path);
            CommandInfo { name, source, preview }
        })
        .collect::<Vec<_>>();
    commands.sort_by(|a, b| a.name.cmp(&b.name));
    commands
}

fn preview_for(path: &Path) -> String {
    let Ok(contents) = std::fs::read_to_string(path) else { return String::new() };
    let mut lines = contents.lines();
    let mut first = lines.next().unwrap_or("").trim();
    if first.starts_with("<!--") {
        first = lines.next().unwrap_or("").trim();
    }
    first.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_command_overrides_user_command() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());
        let project_cmds = project_commands_dir(dir.path());
        std::fs::create_dir_all(&project_cmds).unwrap();
        std::fs::write(project_cmds.join("review.md"), "Review this: $ARGUMENTS").unwrap();

        let commands = discover_commands(dir.path());
        assert!(commands.contains_key("review"));

        let content = load_command(&commands["review"], "the auth module").unwrap();
        assert_eq!(content, "Review this: the auth module");
    }

    #[test]
    fn preview_skips_leading_comment_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmd.md");
        std::fs::write(&path, "<!-- internal note -->\nSummarize the diff").unwrap();
        assert_eq!(preview_for(&path), "Summarize the diff");
    }
}
