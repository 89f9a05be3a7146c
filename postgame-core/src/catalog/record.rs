//! Scenario records and their field types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::AutomationError;

/// Skill tier of a scenario, ordered from easiest to hardest
///
/// Empty or unrecognized tier names read as [`DifficultyTier::Unranked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum DifficultyTier {
    #[default]
    Unranked,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Champion,
    #[serde(rename = "Grand Champion")]
    GrandChampion,
    #[serde(rename = "Supersonic Legend")]
    SupersonicLegend,
}

impl DifficultyTier {
    pub const ALL: [DifficultyTier; 9] = [
        DifficultyTier::Unranked,
        DifficultyTier::Bronze,
        DifficultyTier::Silver,
        DifficultyTier::Gold,
        DifficultyTier::Platinum,
        DifficultyTier::Diamond,
        DifficultyTier::Champion,
        DifficultyTier::GrandChampion,
        DifficultyTier::SupersonicLegend,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DifficultyTier::Unranked => "Unranked",
            DifficultyTier::Bronze => "Bronze",
            DifficultyTier::Silver => "Silver",
            DifficultyTier::Gold => "Gold",
            DifficultyTier::Platinum => "Platinum",
            DifficultyTier::Diamond => "Diamond",
            DifficultyTier::Champion => "Champion",
            DifficultyTier::GrandChampion => "Grand Champion",
            DifficultyTier::SupersonicLegend => "Supersonic Legend",
        }
    }

    /// Parse a tier label, case-insensitively
    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.label().eq_ignore_ascii_case(wanted))
    }
}

impl From<String> for DifficultyTier {
    fn from(label: String) -> Self {
        Self::from_label(&label).unwrap_or_default()
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a scenario record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// Delivered by a catalog snapshot or refresh
    #[default]
    #[serde(alias = "prejump")]
    Imported,
    /// Created by the user; never touched by a refresh
    #[serde(alias = "custom")]
    UserDefined,
}

/// Engagement counters refreshed from the catalog source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Popularity {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub plays: u64,
}

/// One practice scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    /// Unique key, `XXXX-XXXX-XXXX-XXXX`
    pub code: String,

    pub name: String,

    #[serde(default)]
    pub creator: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub difficulty: DifficultyTier,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub shot_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default)]
    pub popularity: Popularity,

    #[serde(default)]
    pub origin: Origin,

    /// Set once a human edits an imported record
    #[serde(default)]
    pub is_user_modified: bool,
}

impl ScenarioRecord {
    /// Minimal imported record
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            creator: String::new(),
            description: String::new(),
            difficulty: DifficultyTier::Unranked,
            tags: BTreeSet::new(),
            shot_count: 0,
            video_url: None,
            popularity: Popularity::default(),
            origin: Origin::Imported,
            is_user_modified: false,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// Copy every user-editable field from `edited`
    ///
    /// Code, origin, popularity and the modification flag are left alone.
    pub fn apply_edit(&mut self, edited: &ScenarioRecord) {
        self.name = edited.name.clone();
        self.creator = edited.creator.clone();
        self.description = edited.description.clone();
        self.difficulty = edited.difficulty;
        self.tags = edited.tags.clone();
        self.shot_count = edited.shot_count;
        self.video_url = edited.video_url.clone();
    }
}

/// Trim and upper-case a user-entered scenario code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// True for four dash-separated groups of four uppercase hex digits
pub fn is_valid_code(code: &str) -> bool {
    let groups: Vec<&str> = code.split('-').collect();
    groups.len() == 4
        && groups.iter().all(|group| {
            group.len() == 4
                && group
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}

/// Normalize a code and reject it if malformed
pub fn validate_code(code: &str) -> Result<String, AutomationError> {
    let normalized = normalize_code(code);
    if is_valid_code(&normalized) {
        Ok(normalized)
    } else {
        Err(AutomationError::InvalidCode {
            code: code.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_validation() {
        assert!(is_valid_code("CE79-F64D-344F-5F1E"));
        assert!(!is_valid_code("ce79-f64d-344f-5f1e"));
        assert!(!is_valid_code("CE79-F64D-344F"));
        assert!(!is_valid_code("CE79-F64D-344F-5F1G"));
        assert!(!is_valid_code("CE79F64D344F5F1E"));

        assert_eq!(
            validate_code("  ce79-f64d-344f-5f1e ").unwrap(),
            "CE79-F64D-344F-5F1E"
        );
        assert!(matches!(
            validate_code("nope"),
            Err(AutomationError::InvalidCode { .. })
        ));
    }

    #[test]
    fn test_tier_ordering_and_serde() {
        assert!(DifficultyTier::Unranked < DifficultyTier::Bronze);
        assert!(DifficultyTier::GrandChampion < DifficultyTier::SupersonicLegend);

        let tier: DifficultyTier = serde_json::from_str("\"Grand Champion\"").unwrap();
        assert_eq!(tier, DifficultyTier::GrandChampion);

        let unknown: DifficultyTier = serde_json::from_str("\"Unknown\"").unwrap();
        assert_eq!(unknown, DifficultyTier::Unranked);

        let empty: DifficultyTier = serde_json::from_str("\"\"").unwrap();
        assert_eq!(empty, DifficultyTier::Unranked);

        let lowercase: DifficultyTier = serde_json::from_str("\"platinum\"").unwrap();
        assert_eq!(lowercase, DifficultyTier::Platinum);

        let record: ScenarioRecord = serde_json::from_str(
            r#"{"code":"AAAA-AAAA-AAAA-AAAA","name":"Odd Tier","difficulty":"Mythic"}"#,
        )
        .unwrap();
        assert_eq!(record.difficulty, DifficultyTier::Unranked);

        assert_eq!(
            serde_json::to_string(&DifficultyTier::SupersonicLegend).unwrap(),
            "\"Supersonic Legend\""
        );
        assert_eq!(DifficultyTier::from_label("diamond"), Some(DifficultyTier::Diamond));
    }

    #[test]
    fn test_origin_aliases() {
        let custom: Origin = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(custom, Origin::UserDefined);
        let prejump: Origin = serde_json::from_str("\"prejump\"").unwrap();
        assert_eq!(prejump, Origin::Imported);
    }

    #[test]
    fn test_apply_edit_keeps_identity() {
        let mut record = ScenarioRecord::new("AAAA-AAAA-AAAA-AAAA", "Old");
        record.popularity.likes = 10;

        let mut edited = ScenarioRecord::new("BBBB-BBBB-BBBB-BBBB", "New");
        edited.shot_count = 12;
        edited.origin = Origin::UserDefined;
        edited.popularity.likes = 99;

        record.apply_edit(&edited);
        assert_eq!(record.code, "AAAA-AAAA-AAAA-AAAA");
        assert_eq!(record.name, "New");
        assert_eq!(record.shot_count, 12);
        assert_eq!(record.origin, Origin::Imported);
        assert_eq!(record.popularity.likes, 10);
    }

    #[test]
    fn test_has_video() {
        let mut record = ScenarioRecord::new("AAAA-AAAA-AAAA-AAAA", "x");
        assert!(!record.has_video());
        record.video_url = Some("  ".to_string());
        assert!(!record.has_video());
        record.video_url = Some("https://youtu.be/x".to_string());
        assert!(record.has_video());
    }
}
