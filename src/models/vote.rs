use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

text_enum! {
    pub enum VoteType {
        General => "general",
        /// Options are member user ids; the winner becomes a manager
        ManagerElection => "manager_election",
    }
}

text_enum! {
    pub enum VoteStatus {
        Open => "open",
        Closed => "closed",
    }
}

/// A room poll
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub room_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub vote_type: String,
    pub options: Value, // JSON array of strings
    pub status: String,
    pub result: Option<String>,
    pub ends_at: NaiveDateTime,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub closed_at: Option<NaiveDateTime>,
}

impl Vote {
    /// Get options as a vector of strings
    pub fn options_vec(&self) -> Vec<String> {
        self.options
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn vote_type_enum(&self) -> VoteType {
        self.vote_type.parse().unwrap_or(VoteType::General)
    }

    pub fn is_open(&self) -> bool {
        self.status == VoteStatus::Open.as_str()
    }

    /// Open and not yet past its deadline
    pub fn accepts_ballots(&self, now: NaiveDateTime) -> bool {
        self.is_open() && now < self.ends_at
    }
}

/// One member's choice in a vote
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoteBallot {
    pub vote_id: Uuid,
    pub user_id: Uuid,
    pub choice: String,
    pub cast_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_vec_skips_non_strings() {
        let now = chrono::Utc::now().naive_utc();
        let vote = Vote {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            title: "Dinner time".into(),
            description: None,
            vote_type: "general".into(),
            options: serde_json::json!(["8pm", 9, "9pm"]),
            status: "open".into(),
            result: None,
            ends_at: now + chrono::Duration::hours(1),
            created_by: Uuid::new_v4(),
            created_at: now,
            closed_at: None,
        };
        assert_eq!(vote.options_vec(), vec!["8pm".to_string(), "9pm".to_string()]);
        assert!(vote.accepts_ballots(now));
        assert!(!vote.accepts_ballots(now + chrono::Duration::hours(2)));
    }
}
