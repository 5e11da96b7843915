//! Small JSON configuration documents: the team roster and per-team settings.
//!
//! Each document type implements [`ConfigDocument`], which names its default
//! value. A document absent from storage loads as that default.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::storage::validate_team_id;
use crate::Result;

/// A JSON document managed as one whole object.
pub trait ConfigDocument:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static
{
    /// Short name used in log lines.
    const KIND: &'static str;

    /// The document returned when nothing is stored.
    fn default_document() -> Self;

    /// Fix up a freshly parsed document. Defaults to the identity.
    fn after_load(self) -> Self {
        self
    }
}

/// One developer on a team roster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Direct access link for the developer's entry page.
    #[serde(default, alias = "access_link")]
    pub link: String,
}

impl Developer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }
}

/// The team roster: team name to developers.
///
/// Stored as a bare JSON object, `{"Team": [{"name": ..}, ..]}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamsConfig {
    teams: BTreeMap<String, Vec<Developer>>,
}

impl ConfigDocument for TeamsConfig {
    const KIND: &'static str = "teams config";

    fn default_document() -> Self {
        Self::default()
    }
}

impl TeamsConfig {
    pub fn team_names(&self) -> impl Iterator<Item = &str> {
        self.teams.keys().map(String::as_str)
    }

    pub fn contains_team(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    pub fn developers(&self, team: &str) -> Option<&[Developer]> {
        self.teams.get(team).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Add an empty team. Returns false if it already exists.
    pub fn add_team(&mut self, team: &str) -> Result<bool> {
        validate_team_id(team)?;
        if self.teams.contains_key(team) {
            return Ok(false);
        }
        self.teams.insert(team.to_string(), Vec::new());
        Ok(true)
    }

    /// Remove a team and its roster. Returns false if it did not exist.
    pub fn remove_team(&mut self, team: &str) -> bool {
        self.teams.remove(team).is_some()
    }

    /// Add a developer to a team, creating the team if needed. A developer
    /// with the same name on that team is replaced.
    pub fn add_developer(&mut self, team: &str, developer: Developer) -> Result<()> {
        validate_team_id(team)?;
        if developer.name.trim().is_empty() {
            return Err(TrackerError::validation("Developer name must not be empty"));
        }
        let roster = self.teams.entry(team.to_string()).or_default();
        match roster.iter_mut().find(|d| d.name == developer.name) {
            Some(existing) => *existing = developer,
            None => roster.push(developer),
        }
        Ok(())
    }

    /// Remove a developer from a team. Returns false if not found.
    pub fn remove_developer(&mut self, team: &str, name: &str) -> bool {
        let Some(roster) = self.teams.get_mut(team) else {
            return false;
        };
        let before = roster.len();
        roster.retain(|d| d.name != name);
        roster.len() != before
    }

    /// Find the team a developer belongs to.
    pub fn find_developer(&self, name: &str) -> Option<(&str, &Developer)> {
        self.teams.iter().find_map(|(team, roster)| {
            roster
                .iter()
                .find(|d| d.name == name)
                .map(|d| (team.as_str(), d))
        })
    }
}

/// Stock work categories.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Feature Development",
    "Bug Fixes",
    "Code Review",
    "Testing",
    "Documentation",
    "Refactoring",
    "API Development",
    "Database Work",
];

/// Stock efficiency areas.
pub const DEFAULT_EFFICIENCY_AREAS: &[&str] = &[
    "Code Generation",
    "Debugging",
    "Code Completion",
    "Test Writing",
    "Documentation",
    "Refactoring",
    "API Design",
    "Query Optimization",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Settings for one team: which categories and efficiency areas its
/// members pick from, and which areas go with which category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSettings {
    pub categories: Vec<String>,
    pub efficiency_areas: Vec<String>,
    pub category_efficiency_mapping: BTreeMap<String, Vec<String>>,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            categories: owned(DEFAULT_CATEGORIES),
            efficiency_areas: owned(DEFAULT_EFFICIENCY_AREAS),
            category_efficiency_mapping: BTreeMap::new(),
        }
    }
}

impl ConfigDocument for TeamSettings {
    const KIND: &'static str = "team settings";

    fn default_document() -> Self {
        Self::default()
    }

    /// Empty lists fall back to the stock lists.
    fn after_load(mut self) -> Self {
        if self.categories.is_empty() {
            self.categories = owned(DEFAULT_CATEGORIES);
        }
        if self.efficiency_areas.is_empty() {
            self.efficiency_areas = owned(DEFAULT_EFFICIENCY_AREAS);
        }
        self
    }
}

impl TeamSettings {
    /// Areas offered for a category: its mapping if one exists, otherwise
    /// every efficiency area.
    pub fn mapped_areas(&self, category: &str) -> &[String] {
        self.category_efficiency_mapping
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(self.efficiency_areas.as_slice())
    }

    /// Replace the area mapping of one category.
    pub fn set_mapping(&mut self, category: impl Into<String>, areas: Vec<String>) {
        self.category_efficiency_mapping.insert(category.into(), areas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teams_config_json_shape() {
        let mut config = TeamsConfig::default();
        config
            .add_developer(
                "Platform Team",
                Developer::new("Alice").with_email("alice@example.com"),
            )
            .unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Platform Team": [
                    {"name": "Alice", "email": "alice@example.com", "link": ""}
                ]
            })
        );
    }

    #[test]
    fn test_developer_accepts_legacy_link_field() {
        let config: TeamsConfig = serde_json::from_str(
            r#"{"QA Team": [{"name": "Eve", "access_link": "http://x/?dev=Eve"}]}"#,
        )
        .unwrap();
        let eve = &config.developers("QA Team").unwrap()[0];
        assert_eq!(eve.link, "http://x/?dev=Eve");
        assert_eq!(eve.email, "");
    }

    #[test]
    fn test_roster_editing() {
        let mut config = TeamsConfig::default();
        assert!(config.add_team("Backend Team").unwrap());
        assert!(!config.add_team("Backend Team").unwrap());
        assert!(config.add_team("../evil").is_err());

        config
            .add_developer("Backend Team", Developer::new("Bob"))
            .unwrap();
        config
            .add_developer("Backend Team", Developer::new("Bob").with_email("b@x"))
            .unwrap();
        assert_eq!(config.developers("Backend Team").unwrap().len(), 1);
        assert_eq!(config.find_developer("Bob").unwrap().0, "Backend Team");
        assert!(config
            .add_developer("Backend Team", Developer::new(" "))
            .is_err());

        assert!(config.remove_developer("Backend Team", "Bob"));
        assert!(!config.remove_developer("Backend Team", "Bob"));
        assert!(config.remove_team("Backend Team"));
        assert!(config.is_empty());
    }

    #[test]
    fn test_team_settings_defaults_and_fallback() {
        let settings = TeamSettings::default_document();
        assert_eq!(settings.categories.len(), 8);
        assert!(settings.category_efficiency_mapping.is_empty());

        let parsed: TeamSettings =
            serde_json::from_str(r#"{"categories": [], "category_efficiency_mapping": {"Testing": ["Test Writing"]}}"#)
                .unwrap();
        let loaded = parsed.after_load();
        assert_eq!(loaded.categories, owned(DEFAULT_CATEGORIES));
        assert_eq!(loaded.efficiency_areas, owned(DEFAULT_EFFICIENCY_AREAS));
        assert_eq!(
            loaded.mapped_areas("Testing"),
            vec!["Test Writing".to_string()].as_slice()
        );
        assert_eq!(loaded.mapped_areas("Bug Fixes").len(), 8);
    }
}
