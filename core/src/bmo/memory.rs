//! Persistent per-project memory: a single Markdown file keyed by a hash of
//! the project's resolved working directory, organized by `## Section`
//! headers. This is distinct from the session-scoped [`crate::bmo::scratchpad`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::bmo::error::Result;

const MEMORY_FILENAME: &str = "MEMORY.md";

fn memory_base_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("bmo").join("data").join("memory")
}

fn project_hash(working_dir: &Path) -> String {
    let resolved = working_dir.canonicalize().unwrap_or_else(|_| working_dir.to_path_buf());
    let digest = md5::compute(resolved.to_string_lossy().as_bytes());
    format!("{digest:x}")[..12].to_string()
}

pub fn memory_path(working_dir: &Path) -> PathBuf {
    memory_base_dir().join(project_hash(working_dir)).join(MEMORY_FILENAME)
}

/// Per-path advisory locks so concurrent writers to the same project's
/// memory file within this process serialize rather than interleave.
lazy_static! {
    static ref FILE_LOCKS: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> = Mutex::new(HashMap::new());
}

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = FILE_LOCKS.lock().unwrap();
    locks.entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

/// Load the memory file, truncating to `max_lines` with a trailing marker
/// if longer. Returns an empty string if no memory exists yet.
pub fn load(working_dir: &Path, max_lines: usize) -> String {
    let path = memory_path(working_dir);
    let _guard = lock_for(&path).lock().unwrap();

    let Ok(contents) = std::fs::read_to_string(&path) else {
        return String::new();
    };

    let lines: Vec<&str> = contents.split_inclusive('\n').collect();
    if lines.len() > max_lines {
        let mut truncated: String = lines[..max_lines].concat();
        truncated.push_str(&format!("\n... ({} lines truncated) ...\n", lines.len() - max_lines));
        truncated
    } else {
        contents
    }
}

/// Overwrite or append to the memory file, inserting a separating blank
/// line on append when the file already has content.
pub fn save(working_dir: &Path, content: &str, append: bool) -> Result<()> {
    let path = memory_path(working_dir);
    let _guard = lock_for(&path).lock().unwrap();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if append {
        let needs_separator = path.is_file() && std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        if needs_separator {
            writeln!(file)?;
        }
        write!(file, "{content}")?;
    } else {
        std::fs::write(&path, content)?;
    }
    Ok(())
}

/// Replace the block starting at `## <section>` up to (not including) the
/// next `## ` header, or append a new section if none exists. Idempotent:
/// calling twice with the same arguments leaves the file byte-identical.
/// Every path normalizes to exactly one trailing newline so the replace
/// branch reproduces the same bytes the insert branch would have written.
pub fn update_section(working_dir: &Path, section: &str, content: &str) -> Result<()> {
    let path = memory_path(working_dir);
    let _guard = lock_for(&path).lock().unwrap();

    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    let header = format!("## {section}");

    let mut updated = if existing.contains(&header) {
        let mut result: Vec<String> = Vec::new();
        let mut in_section = false;
        let mut replaced = false;
        for line in existing.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("## ") {
                if trimmed == header {
                    in_section = true;
                    if !replaced {
                        result.push(header.clone());
                        result.extend(content.lines().map(|l| l.to_string()));
                        replaced = true;
                    }
                    continue;
                } else {
                    in_section = false;
                }
            }
            if !in_section {
                result.push(line.to_string());
            }
        }
        result.join("\n")
    } else if existing.is_empty() {
        format!("{header}\n{content}")
    } else {
        let mut base = existing;
        if !base.ends_with('\n') {
            base.push('\n');
        }
        format!("{base}\n{header}\n{content}")
    };

    if !updated.ends_with('\n') {
        updated.push('\n');
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, updated)?;
    Ok(())
}

/// Delete the memory file. Returns whether it existed.
pub fn clear(working_dir: &Path) -> Result<bool> {
    let path = memory_path(working_dir);
    let _guard = lock_for(&path).lock().unwrap();
    if path.is_file() {
        std::fs::remove_file(&path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Fixed system-prompt fragment telling the model what is worth persisting.
pub fn memory_guidance() -> &'static str {
    "You have a persistent memory system. Use the write_memory and read_memory tools to save and recall information across sessions.\n\n\
Save stable patterns:\n\
- Project conventions confirmed across interactions\n\
- Key file paths and architecture decisions\n\
- User preferences for workflow and tools\n\
- Solutions to recurring problems\n\n\
Do NOT save:\n\
- Session-specific context (current task details, temporary state)\n\
- Speculative or unverified conclusions\n\
- Duplicate information already in memory"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_section_is_idempotent_p12() {
        let dir = tempfile::tempdir().unwrap();
        update_section(dir.path(), "Notes", "first note").unwrap();
        let once = std::fs::read_to_string(memory_path(dir.path())).unwrap();
        update_section(dir.path(), "Notes", "first note").unwrap();
        let twice = std::fs::read_to_string(memory_path(dir.path())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn update_section_replaces_in_place() {
        let dir = tempfile::tempdir().unwrap();
        update_section(dir.path(), "A", "a1").unwrap();
        update_section(dir.path(), "B", "b1").unwrap();
        update_section(dir.path(), "A", "a2").unwrap();
        let content = std::fs::read_to_string(memory_path(dir.path())).unwrap();
        assert!(content.contains("## A\na2"));
        assert!(content.contains("## B\nb1"));
        assert!(!content.contains("a1"));
    }

    #[test]
    fn clear_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!clear(dir.path()).unwrap());
        save(dir.path(), "hello", false).unwrap();
        assert!(clear(dir.path()).unwrap());
    }
}
