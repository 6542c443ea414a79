use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An administrator-uploaded reference document held for the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSource {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub data: String,
    pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResource {
    pub id: String,
    pub title: String,
    pub uri: String,
}

const OFFICIAL_LINKS: [(&str, &str); 5] = [
    (
        "Q1 2025 Profit Growth",
        "https://www.slt.lk/en/news/slt-mobitel-surges-ahead-robust-q1-2025-profit-growth",
    ),
    (
        "Revenue Growth 1H 2024",
        "https://www.slt.lk/en/news/despite-challenges-market-slt-mobitel-reports-moderate-revenue-growth-1h-2024",
    ),
    (
        "Financial Recovery Q3 2024",
        "https://www.slt.lk/en/news/slt-mobitel-achieves-financial-recovery-q3-2024",
    ),
    ("Annual Report 2024", "https://sltmobitel.lk/documents/Annual-Reports/an_2024.pdf"),
    ("Wikipedia SLTMobitel", "https://en.wikipedia.org/wiki/SLTMobitel"),
];

/// Session-scoped reference material that is summarised into every user
/// turn as an advisory note. Nothing here outlives the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeContext {
    pub sources: Vec<KnowledgeSource>,
    pub web_resources: Vec<WebResource>,
}

impl Default for KnowledgeContext {
    fn default() -> Self {
        let web_resources = OFFICIAL_LINKS
            .iter()
            .enumerate()
            .map(|(index, (title, uri))| WebResource {
                id: (index + 1).to_string(),
                title: (*title).to_string(),
                uri: (*uri).to_string(),
            })
            .collect();
        Self { sources: Vec::new(), web_resources }
    }
}

impl KnowledgeContext {
    pub fn empty() -> Self {
        Self { sources: Vec::new(), web_resources: Vec::new() }
    }

    /// Registers an uploaded document. `data` is the encoded payload and
    /// `size` the original byte length.
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        data: impl Into<String>,
    ) -> &KnowledgeSource {
        self.sources.push(KnowledgeSource {
            id: Uuid::new_v4().simple().to_string(),
            name: name.into(),
            size,
            data: data.into(),
            mime_type: mime_type.into(),
        });
        &self.sources[self.sources.len() - 1]
    }

    /// Adds a link; blank titles or uris are ignored.
    pub fn add_web_resource(
        &mut self,
        title: impl Into<String>,
        uri: impl Into<String>,
    ) -> Option<&WebResource> {
        let (title, uri) = (title.into(), uri.into());
        if title.trim().is_empty() || uri.trim().is_empty() {
            return None;
        }
        self.web_resources.push(WebResource {
            id: Uuid::new_v4().simple().to_string(),
            title,
            uri,
        });
        self.web_resources.last()
    }

    pub fn remove_source(&mut self, id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.id != id);
        before != self.sources.len()
    }

    pub fn remove_web_resource(&mut self, id: &str) -> bool {
        let before = self.web_resources.len();
        self.web_resources.retain(|resource| resource.id != id);
        before != self.web_resources.len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.name.clone()).collect()
    }

    pub fn resource_titles(&self) -> Vec<String> {
        self.web_resources.iter().map(|resource| resource.title.clone()).collect()
    }
}

/// Renders the opaque context note appended to a user turn.
pub fn advisory_note(source_names: &[String], resource_titles: &[String]) -> String {
    format!(
        "[Context: \n    Knowledge Base: {}\n    Web Resources: {}\n  ]",
        source_names.join(", "),
        resource_titles.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::{advisory_note, KnowledgeContext};

    #[test]
    fn default_context_carries_official_links() {
        let context = KnowledgeContext::default();
        assert_eq!(context.web_resources.len(), 5);
        assert_eq!(context.web_resources[3].title, "Annual Report 2024");
        assert!(context.sources.is_empty());
    }

    #[test]
    fn advisory_note_lists_names_and_titles() {
        let note = advisory_note(
            &["fiber-faq.pdf".to_string(), "router-guide.pdf".to_string()],
            &["Wikipedia SLTMobitel".to_string()],
        );
        assert!(note.starts_with("[Context: "));
        assert!(note.contains("Knowledge Base: fiber-faq.pdf, router-guide.pdf"));
        assert!(note.contains("Web Resources: Wikipedia SLTMobitel"));
        assert!(note.ends_with(']'));
    }

    #[test]
    fn sources_can_be_added_and_removed() {
        let mut context = KnowledgeContext::empty();
        let id = context.add_source("plans.pdf", "application/pdf", 5, "JVBERi0=").id.clone();
        assert_eq!(context.source_names(), vec!["plans.pdf".to_string()]);
        assert_eq!(context.sources[0].size, 5);

        assert!(context.remove_source(&id));
        assert!(!context.remove_source(&id));
        assert!(context.sources.is_empty());
    }

    #[test]
    fn blank_links_are_ignored_and_added_links_can_be_removed() {
        let mut context = KnowledgeContext::default();
        assert!(context.add_web_resource("  ", "https://www.slt.lk").is_none());
        assert!(context.add_web_resource("Coverage map", "").is_none());

        let id = context
            .add_web_resource("Coverage map", "https://www.slt.lk/coverage")
            .map(|resource| resource.id.clone())
            .expect("link added");
        assert_eq!(context.resource_titles().len(), 6);
        assert!(context.remove_web_resource(&id));
        assert!(context.remove_web_resource("1"));
        assert_eq!(context.resource_titles().len(), 4);
    }
}
