use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Controller → category pairs used when no taxonomy is configured.
static DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("announcements", "announcements"),
    ("assignments", "assignments"),
    ("submissions", "assignments"),
    ("calendar_events", "calendar"),
    ("calendars", "calendar"),
    ("collaborations", "collaborations"),
    ("conferences", "conferences"),
    ("discussion_topics", "discussions"),
    ("discussion_entries", "discussions"),
    ("files", "files"),
    ("folders", "files"),
    ("gradebooks", "grades"),
    ("grades", "grades"),
    ("groups", "groups"),
    ("context_modules", "modules"),
    ("quizzes", "quizzes"),
    ("quiz_submissions", "quizzes"),
    ("courses", "general"),
    ("wiki_pages", "pages"),
    ("outcomes", "outcomes"),
    ("rubrics", "outcomes"),
    ("users", "roster"),
    ("context", "roster"),
];

/// Maps request controllers onto reporting categories.
///
/// Passed into the rollup driver as a value so different taxonomies can be
/// used side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    pub categories: HashMap<String, String>,
    #[serde(default = "default_category")]
    pub default_category: String,
}

fn default_category() -> String {
    "other".to_string()
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|&(controller, category)| (controller.to_string(), category.to_string()))
                .collect(),
            default_category: default_category(),
        }
    }
}

impl CategoryTaxonomy {
    pub fn new(categories: HashMap<String, String>, default_category: impl Into<String>) -> Self {
        Self {
            categories,
            default_category: default_category.into(),
        }
    }

    pub fn categorize(&self, controller: &str) -> &str {
        self.categories
            .get(controller)
            .map(String::as_str)
            .unwrap_or(&self.default_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_taxonomy() {
        let taxonomy = CategoryTaxonomy::default();
        assert_eq!(taxonomy.categorize("wiki_pages"), "pages");
        assert_eq!(taxonomy.categorize("quiz_submissions"), "quizzes");
        assert_eq!(taxonomy.categorize("something_new"), "other");
    }

    #[test]
    fn test_custom_taxonomies_coexist() {
        let coarse = CategoryTaxonomy::new(
            HashMap::from([("wiki_pages".to_string(), "content".to_string())]),
            "misc",
        );
        let fine = CategoryTaxonomy::default();

        assert_eq!(coarse.categorize("wiki_pages"), "content");
        assert_eq!(coarse.categorize("files"), "misc");
        assert_eq!(fine.categorize("files"), "files");
    }

    #[test]
    fn test_deserialize_defaults_category() {
        let taxonomy: CategoryTaxonomy =
            serde_json::from_str(r#"{"categories": {"files": "content"}}"#).unwrap();
        assert_eq!(taxonomy.default_category, "other");
        assert_eq!(taxonomy.categorize("files"), "content");
    }
}
