// ABOUTME: Entity profile data model: header fields, birth date, image and the family relation map.
// ABOUTME: Relation entries are name/url back-references and never own the referenced entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A link to another entity's page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonLink {
    pub name: String,
    pub url: String,
}

impl PersonLink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parents {
    pub father: Option<PersonLink>,
    pub mother: Option<PersonLink>,
}

/// Category label to the people filling that role, in first-seen order.
pub type RelationMap = BTreeMap<String, Vec<PersonLink>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub parents: Parents,
    pub siblings: RelationMap,
    pub spouse: Vec<PersonLink>,
    pub children: Vec<PersonLink>,
    /// Numbered label to name, e.g. `형1`, `배우자1`, `자녀2`.
    pub flatten: BTreeMap<String, String>,
}

impl Family {
    pub fn has_any_relation(&self) -> bool {
        self.parents.father.is_some()
            || self.parents.mother.is_some()
            || self.siblings.values().any(|v| !v.is_empty())
            || !self.spouse.is_empty()
            || !self.children.is_empty()
    }
}

/// The per-name result of entity resolution.
///
/// When every title variant fails, `error` is set, `resolved_title` is
/// empty and no extracted fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub resolved_title: Option<String>,
    pub source_url: String,
    pub attempted_titles: Vec<String>,
    pub position: Option<String>,
    pub name_local: Option<String>,
    pub name_alt_script: Option<String>,
    pub name_latin: Option<String>,
    pub profile_image: Option<String>,
    pub birth_date: Option<String>,
    #[serde(default)]
    pub family: Family,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntityProfile {
    pub fn failed(
        source_url: impl Into<String>,
        attempted_titles: Vec<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            attempted_titles,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_profile_serializes_error_and_no_family_links() {
        let p = EntityProfile::failed("https://namu.wiki/w/x", vec!["x".into()], "all candidates failed");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["error"], "all candidates failed");
        assert_eq!(json["resolved_title"], serde_json::Value::Null);
        assert!(json["family"]["spouse"].as_array().unwrap().is_empty());
        assert!(!p.family.has_any_relation());
    }

    #[test]
    fn profile_without_error_omits_error_key() {
        let p = EntityProfile {
            resolved_title: Some("김철수".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("error").is_none());
    }
}
