//! Session-scoped, named-section text store shared between agents.
//!
//! Volatile: resets at process start, never persisted. Every read of a
//! missing section returns the empty string — this is never an error.

use std::collections::HashMap;

use tokio::sync::RwLock;

#[derive(Default)]
pub struct Scratchpad {
    sections: RwLock<HashMap<String, String>>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn write(&self, section: &str, content: &str, append: bool) {
        let mut sections = self.sections.write().await;
        if append {
            if let Some(existing) = sections.get_mut(section) {
                existing.push('\n');
                existing.push_str(content);
                return;
            }
        }
        sections.insert(section.to_string(), content.to_string());
    }

    pub async fn read(&self, section: &str) -> String {
        self.sections.read().await.get(section).cloned().unwrap_or_default()
    }

    pub async fn read_all(&self) -> String {
        let sections = self.sections.read().await;
        if sections.is_empty() {
            return String::new();
        }
        sections
            .iter()
            .map(|(name, content)| format!("## {name}\n{content}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Clear one section, or every section when `section` is `None`.
    pub async fn clear(&self, section: Option<&str>) {
        let mut sections = self.sections.write().await;
        match section {
            Some(name) => {
                sections.remove(name);
            }
            None => sections.clear(),
        }
    }

    /// One line per section: `- <name>: <first line or first 80 chars>`.
    pub async fn summary(&self) -> String {
        let sections = self.sections.read().await;
        if sections.is_empty() {
            return String::new();
        }
        sections
            .iter()
            .map(|(name, content)| {
                let first_line = content.lines().next().unwrap_or("");
                let preview: String = first_line.chars().take(80).collect();
                format!("- {name}: {preview}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn sections(&self) -> Vec<String> {
        self.sections.read().await.keys().cloned().collect()
    }

    pub async fn has_content(&self) -> bool {
        !self.sections.read().await.is_empty()
    }

    pub async fn to_dict(&self) -> HashMap<String, String> {
        self.sections.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_section_reads_empty() {
        let pad = Scratchpad::new();
        assert_eq!(pad.read("nope").await, "");
    }

    #[tokio::test]
    async fn append_joins_with_newline() {
        let pad = Scratchpad::new();
        pad.write("Plan", "line one", false).await;
        pad.write("Plan", "line two", true).await;
        assert_eq!(pad.read("Plan").await, "line one\nline two");
    }

    #[tokio::test]
    async fn clear_all_vs_one() {
        let pad = Scratchpad::new();
        pad.write("A", "x", false).await;
        pad.write("B", "y", false).await;
        pad.clear(Some("A")).await;
        assert_eq!(pad.sections().await, vec!["B".to_string()]);
        pad.clear(None).await;
        assert!(!pad.has_content().await);
    }
}
