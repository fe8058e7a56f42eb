//! Provider-hosted tools offered to free-text calls

use procure_ai::Tool;

/// The hosted tools enabled for chat and investigation calls.
///
/// Web search is always on. File search joins it only when a knowledge base
/// is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSet {
    knowledge_base_id: Option<String>,
}

impl ToolSet {
    pub fn new(knowledge_base_id: Option<String>) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        }
    }

    /// Configured knowledge base, if any
    pub fn knowledge_base_id(&self) -> Option<&str> {
        self.knowledge_base_id.as_deref()
    }

    /// Tool list to attach to a call
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools = vec![Tool::WebSearch];
        if let Some(id) = &self.knowledge_base_id {
            tools.push(Tool::FileSearch {
                vector_store_ids: vec![id.clone()],
            });
        }
        tools
    }

    /// Names of the enabled tools, for logging
    pub fn names(&self) -> Vec<&'static str> {
        self.tools()
            .iter()
            .map(|t| match t {
                Tool::WebSearch => "web_search",
                Tool::FileSearch { .. } => "file_search",
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_search_only_without_knowledge_base() {
        let tools = ToolSet::default().tools();
        assert_eq!(tools, vec![Tool::WebSearch]);
    }

    #[test]
    fn test_file_search_added_with_knowledge_base() {
        let set = ToolSet::new(Some("vs_123".into()));
        assert_eq!(
            set.tools(),
            vec![
                Tool::WebSearch,
                Tool::FileSearch {
                    vector_store_ids: vec!["vs_123".into()]
                }
            ]
        );
        assert_eq!(set.names(), vec!["web_search", "file_search"]);
    }

    #[test]
    fn test_blank_knowledge_base_is_ignored() {
        let set = ToolSet::new(Some("   ".into()));
        assert_eq!(set.knowledge_base_id(), None);
        assert_eq!(set.tools().len(), 1);
    }
}
