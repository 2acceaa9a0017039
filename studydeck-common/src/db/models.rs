//! Database row models

use serde::{Deserialize, Serialize};

/// How a submission's accepted terms are combined into the shared sequence.
///
/// Only `Default` (simple append) is implemented. Unknown database values
/// must be rejected by callers, never guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeStrategy {
    Default,
}

impl MergeStrategy {
    /// Parse from database string representation
    pub fn from_db(s: &str) -> Option<MergeStrategy> {
        match s {
            "default" => Some(MergeStrategy::Default),
            _ => None,
        }
    }

    /// Convert to database string representation
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MergeStrategy::Default => "default",
        }
    }
}

/// Assignment type tag. Only collaborative assignments are relevant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentType {
    Collab,
}

impl AssignmentType {
    pub fn from_db(s: &str) -> Option<AssignmentType> {
        match s {
            "collab" => Some(AssignmentType::Collab),
            _ => None,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            AssignmentType::Collab => "collab",
        }
    }
}

/// Collaboration constraints attached to a study set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabConfig {
    pub study_set_id: String,
    pub merge_strategy: String,
    pub min_terms_per_user: Option<i64>,
    pub max_terms_per_user: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub guid: String,
    pub class_id: String,
    pub study_set_id: String,
    pub assignment_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMember {
    pub guid: String,
    pub class_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub guid: String,
    pub assignment_id: String,
    pub member_id: String,
    pub started_at: Option<chrono::NaiveDateTime>,
    /// Null while the submission is a draft; set exactly once on merge
    pub submitted_at: Option<chrono::NaiveDateTime>,
}

/// A study-set term row
///
/// `rank` is meaningful only when `ephemeral` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub guid: String,
    pub word: String,
    pub definition: String,
    pub word_rich_text: Option<String>,
    pub definition_rich_text: Option<String>,
    pub rank: i64,
    pub study_set_id: String,
    pub author_id: String,
    pub ephemeral: bool,
    pub submission_id: Option<String>,
}
