//! Read-only paper model consumed by the pipeline.

use serde::{Deserialize, Serialize};

/// Section titles that never yield visualization candidates.
pub const ADMINISTRATIVE_TITLES: &[&str] = &[
    "references",
    "bibliography",
    "acknowledgments",
    "acknowledgements",
    "appendix",
    "supplementary",
    "related work",
];

/// Sections with this little body text are not worth analyzing.
pub const MIN_SECTION_CHARS: usize = 100;

/// One section of a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable identifier (e.g. `section-3-2`).
    pub id: String,
    pub title: String,
    /// Body text.
    pub content: String,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Whether the section title names an administrative section.
    pub fn is_administrative(&self) -> bool {
        let title = self.title.trim().to_lowercase();
        ADMINISTRATIVE_TITLES.contains(&title.as_str())
    }

    /// Whether the section should be sent to the candidate extractor.
    pub fn is_eligible(&self) -> bool {
        !self.is_administrative() && self.content.chars().count() > MIN_SECTION_CHARS
    }
}

/// A paper: title, abstract and ordered sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    pub sections: Vec<Section>,
}

impl Paper {
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Sections eligible for candidate extraction, in paper order.
    pub fn eligible_sections(&self) -> Vec<&Section> {
        self.sections.iter().filter(|s| s.is_eligible()).collect()
    }

    /// Short context string handed to the planner.
    pub fn context(&self) -> String {
        format!("Title: {}\n\nAbstract: {}", self.title, self.abstract_text)
    }
}
