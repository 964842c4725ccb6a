use crate::error::{AppError, AppResult};
use crate::models::{NotificationKind, Role, RoomMember, Vote, VoteBallot, VoteType};
use crate::permissions::Permission;
use crate::repositories::{RoomMemberRepository, VoteRepository};
use crate::services::validation::{optional_text, required_text};
use crate::services::{AccessControl, AuditTrailService, NotificationService};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;
pub const MAX_VOTE_DAYS: i64 = 30;
const MAX_TITLE_LEN: usize = 120;
const MAX_OPTION_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVote {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_vote_type")]
    pub vote_type: VoteType,
    pub options: Vec<String>,
    pub ends_at: DateTime<Utc>,
}

fn default_vote_type() -> VoteType {
    VoteType::General
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionCount {
    pub option: String,
    pub votes: usize,
}

/// Ballot counts per option, in option order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub counts: Vec<OptionCount>,
    pub total: usize,
    /// The single option with the most votes; none on a tie or without ballots
    pub winner: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteView {
    #[serde(flatten)]
    pub vote: Vote,
    pub tally: Tally,
    pub my_choice: Option<String>,
}

/// Count ballots; choices that are not options are ignored
pub fn tally(options: &[String], ballots: &[VoteBallot]) -> Tally {
    let mut by_choice: HashMap<&str, usize> = HashMap::new();
    for ballot in ballots {
        *by_choice.entry(ballot.choice.as_str()).or_default() += 1;
    }

    let counts: Vec<OptionCount> = options
        .iter()
        .map(|o| OptionCount {
            option: o.clone(),
            votes: by_choice.get(o.as_str()).copied().unwrap_or(0),
        })
        .collect();
    let total = counts.iter().map(|c| c.votes).sum();

    let top = counts.iter().map(|c| c.votes).max().unwrap_or(0);
    let mut leaders = counts.iter().filter(|c| c.votes == top);
    let winner = match (top, leaders.next(), leaders.next()) {
        (0, _, _) => None,
        (_, Some(only), None) => Some(only.option.clone()),
        _ => None,
    };

    Tally {
        counts,
        total,
        winner,
    }
}

/// Trim, check and de-duplicate vote options
fn clean_options(options: &[String]) -> AppResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::with_capacity(options.len());
    for option in options {
        let option = required_text(option, "option", MAX_OPTION_LEN)?;
        if !seen.insert(option.to_lowercase()) {
            return Err(AppError::Validation(format!("Duplicate option: {}", option)));
        }
        cleaned.push(option);
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&cleaned.len()) {
        return Err(AppError::Validation(format!(
            "A vote needs between {} and {} options",
            MIN_OPTIONS, MAX_OPTIONS
        )));
    }
    Ok(cleaned)
}

fn check_deadline(ends_at: NaiveDateTime, now: NaiveDateTime) -> AppResult<()> {
    if ends_at <= now {
        return Err(AppError::Validation("ends_at must be in the future".to_string()));
    }
    if ends_at > now + Duration::days(MAX_VOTE_DAYS) {
        return Err(AppError::Validation(format!(
            "A vote can run for at most {} days",
            MAX_VOTE_DAYS
        )));
    }
    Ok(())
}

/// The user a manager election's winning option names
fn election_winner(vote: &Vote, winner: Option<&str>) -> Option<Uuid> {
    if vote.vote_type_enum() != VoteType::ManagerElection {
        return None;
    }
    let winner = winner?;
    match winner.parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Election winner {} is not a user id", winner);
            None
        }
    }
}

/// Winners already at manager rank or above keep their role
fn needs_promotion(member: &RoomMember) -> bool {
    member.role_enum().rank() < Role::Manager.rank()
}

pub struct VoteService {
    votes: Arc<VoteRepository>,
    members: Arc<RoomMemberRepository>,
    access: Arc<AccessControl>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditTrailService>,
}

impl VoteService {
    pub fn new(
        votes: Arc<VoteRepository>,
        members: Arc<RoomMemberRepository>,
        access: Arc<AccessControl>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            votes,
            members,
            access,
            notifications,
            audit,
        }
    }

    async fn find(&self, room_id: Uuid, vote_id: Uuid) -> AppResult<Vote> {
        self.votes
            .find_by_id(room_id, vote_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vote not found".to_string()))
    }

    pub async fn create_vote(&self, room_id: Uuid, actor_id: Uuid, request: &NewVote) -> AppResult<Vote> {
        self.access
            .require(room_id, actor_id, Permission::CreateVotes)
            .await?;
        let title = required_text(&request.title, "title", MAX_TITLE_LEN)?;
        let description = optional_text(request.description.as_deref(), "description", MAX_DESCRIPTION_LEN)?;
        let options = clean_options(&request.options)?;
        let ends_at = request.ends_at.naive_utc();
        check_deadline(ends_at, Utc::now().naive_utc())?;

        if request.vote_type == VoteType::ManagerElection {
            let members: HashSet<Uuid> = self.members.member_ids(room_id).await?.into_iter().collect();
            for option in &options {
                let candidate = option.parse::<Uuid>().map_err(|_| {
                    AppError::Validation(format!("Election option {} is not a user id", option))
                })?;
                if !members.contains(&candidate) {
                    return Err(AppError::Validation(format!(
                        "Candidate {} is not a member of this room",
                        candidate
                    )));
                }
            }
        }

        let vote = self
            .votes
            .create(
                room_id,
                &title,
                description.as_deref(),
                request.vote_type,
                &options,
                ends_at,
                actor_id,
            )
            .await?;

        info!(
            "Vote {} ({}) created in room {} by {} with {} options",
            vote.id,
            vote.vote_type,
            room_id,
            actor_id,
            options.len()
        );
        self.notifications
            .notify_room(
                room_id,
                Some(actor_id),
                NotificationKind::VoteCreated,
                "New vote",
                &format!("Vote on '{}' before {}", vote.title, vote.ends_at.format("%Y-%m-%d %H:%M UTC")),
            )
            .await;
        Ok(vote)
    }

    pub async fn list_votes(&self, room_id: Uuid, user_id: Uuid) -> AppResult<Vec<Vote>> {
        self.access.membership(room_id, user_id).await?;
        Ok(self.votes.list(room_id).await?)
    }

    pub async fn get_vote(&self, room_id: Uuid, user_id: Uuid, vote_id: Uuid) -> AppResult<VoteView> {
        self.access.membership(room_id, user_id).await?;
        let vote = self.find(room_id, vote_id).await?;
        let ballots = self.votes.ballots(vote_id).await?;

        let my_choice = ballots
            .iter()
            .find(|b| b.user_id == user_id)
            .map(|b| b.choice.clone());
        let tally = tally(&vote.options_vec(), &ballots);
        Ok(VoteView {
            vote,
            tally,
            my_choice,
        })
    }

    pub async fn cast_ballot(&self, room_id: Uuid, user_id: Uuid, vote_id: Uuid, choice: &str) -> AppResult<VoteBallot> {
        self.access.membership(room_id, user_id).await?;
        let vote = self.find(room_id, vote_id).await?;
        if !vote.accepts_ballots(Utc::now().naive_utc()) {
            return Err(AppError::BusinessLogic("This vote is closed".to_string()));
        }
        let choice = choice.trim();
        if !vote.options_vec().iter().any(|o| o == choice) {
            return Err(AppError::Validation(format!("'{}' is not an option of this vote", choice)));
        }

        let ballot = self.votes.upsert_ballot(vote_id, user_id, choice).await?;
        info!("Ballot cast on vote {} by {}", vote_id, user_id);
        Ok(ballot)
    }

    pub async fn close_vote(&self, room_id: Uuid, actor_id: Uuid, vote_id: Uuid) -> AppResult<VoteView> {
        let actor = self.access.membership(room_id, actor_id).await?;
        let vote = self.find(room_id, vote_id).await?;
        if vote.created_by != actor_id && !actor.role_enum().has(Permission::CloseVotes) {
            return Err(AppError::Forbidden(
                "Only the creator or a manager can close this vote".to_string(),
            ));
        }
        if !vote.is_open() {
            return Err(AppError::BusinessLogic("This vote is already closed".to_string()));
        }

        let (closed, tally) = self.finish(vote, Some(actor_id)).await?;
        Ok(VoteView {
            vote: closed,
            tally,
            my_choice: None,
        })
    }

    /// Close a vote, apply an election result and tell the room
    async fn finish(&self, vote: Vote, actor_id: Option<Uuid>) -> AppResult<(Vote, Tally)> {
        let ballots = self.votes.ballots(vote.id).await?;
        let tally = tally(&vote.options_vec(), &ballots);
        let promotion = self.promotion(&vote, tally.winner.as_deref()).await?;

        let (closed, promoted) = self
            .votes
            .close(
                vote.id,
                tally.winner.as_deref(),
                promotion.as_ref().map(|m| (m.user_id, Role::Manager)),
            )
            .await?
            .ok_or_else(|| AppError::Conflict("This vote was closed concurrently".to_string()))?;

        if let (Some(member), true) = (promotion, promoted) {
            self.announce_promotion(&member, actor_id).await;
        }

        let outcome = match &tally.winner {
            Some(w) => format!("Vote '{}' closed; result: {}", closed.title, w),
            None => format!("Vote '{}' closed without a winner", closed.title),
        };
        self.notifications
            .notify_room(closed.room_id, None, NotificationKind::VoteClosed, "Vote closed", &outcome)
            .await;
        info!(
            "Vote {} closed with {} ballots, winner={:?}",
            closed.id, tally.total, tally.winner
        );
        Ok((closed, tally))
    }

    /// The member an election result promotes, resolved before the vote closes
    async fn promotion(&self, vote: &Vote, winner: Option<&str>) -> AppResult<Option<RoomMember>> {
        let Some(user_id) = election_winner(vote, winner) else {
            return Ok(None);
        };
        let Some(member) = self.members.find(vote.room_id, user_id).await? else {
            warn!("Election winner {} has left room {}", user_id, vote.room_id);
            return Ok(None);
        };
        Ok(needs_promotion(&member).then_some(member))
    }

    async fn announce_promotion(&self, member: &RoomMember, actor_id: Option<Uuid>) {
        let (room_id, user_id) = (member.room_id, member.user_id);
        self.access.membership_changed(room_id, user_id).await;
        self.audit
            .record(
                "role_changed",
                Some(room_id),
                actor_id,
                serde_json::json!({ "user_id": user_id, "from": member.role, "to": Role::Manager, "reason": "election" }),
            )
            .await;
        self.notifications
            .notify_quietly(
                user_id,
                Some(room_id),
                NotificationKind::RoleChanged,
                "Elected manager",
                "You won the manager election",
            )
            .await;
    }

    /// Close every open vote past its deadline; returns how many were closed
    pub async fn close_expired(&self) -> AppResult<usize> {
        let expired = self.votes.list_expired(Utc::now().naive_utc()).await?;
        let mut closed = 0;
        for vote in expired {
            let id = vote.id;
            match self.finish(vote, None).await {
                Ok(_) => closed += 1,
                Err(e) => warn!("Failed to close expired vote {}: {}", id, e),
            }
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ballot(choice: &str) -> VoteBallot {
        VoteBallot {
            vote_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            choice: choice.to_string(),
            cast_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_unique_maximum_wins() {
        let t = tally(
            &options(&["rice", "noodles", "bread"]),
            &[ballot("rice"), ballot("noodles"), ballot("rice")],
        );
        assert_eq!(t.winner.as_deref(), Some("rice"));
        assert_eq!(t.total, 3);
        assert_eq!(t.counts[0], OptionCount { option: "rice".into(), votes: 2 });
        assert_eq!(t.counts[2].votes, 0);
    }

    #[test]
    fn test_tie_has_no_winner() {
        let t = tally(&options(&["a", "b"]), &[ballot("a"), ballot("b")]);
        assert_eq!(t.winner, None);
        assert_eq!(t.total, 2);
    }

    #[test]
    fn test_no_ballots_has_no_winner() {
        let t = tally(&options(&["a", "b"]), &[]);
        assert_eq!(t.winner, None);
        assert_eq!(t.total, 0);
    }

    #[test]
    fn test_stale_choices_are_ignored() {
        let t = tally(&options(&["a", "b"]), &[ballot("c"), ballot("b")]);
        assert_eq!(t.winner.as_deref(), Some("b"));
        assert_eq!(t.total, 1);
    }

    #[test]
    fn test_option_rules() {
        assert_eq!(clean_options(&options(&[" a ", "b"])).unwrap(), options(&["a", "b"]));
        assert!(clean_options(&options(&["a"])).is_err());
        assert!(clean_options(&options(&["a", "A"])).is_err());
        assert!(clean_options(&options(&["a", " "])).is_err());
        let eleven: Vec<String> = (0..11).map(|i| i.to_string()).collect();
        assert!(clean_options(&eleven).is_err());
    }

    fn vote(vote_type: VoteType) -> Vote {
        Vote {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            title: "Next manager".into(),
            description: None,
            vote_type: vote_type.as_str().into(),
            options: serde_json::json!([]),
            status: "open".into(),
            result: None,
            ends_at: Utc::now().naive_utc(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now().naive_utc(),
            closed_at: None,
        }
    }

    #[test]
    fn test_only_elections_name_a_winner() {
        let id = Uuid::new_v4();
        let winner = id.to_string();
        let election = vote(VoteType::ManagerElection);
        assert_eq!(election_winner(&election, Some(&winner)), Some(id));
        assert_eq!(election_winner(&election, Some("Rice")), None);
        assert_eq!(election_winner(&election, None), None);
        assert_eq!(election_winner(&vote(VoteType::General), Some(&winner)), None);
    }

    #[test]
    fn test_promotion_skips_higher_ranks() {
        let member = |role: Role| RoomMember {
            room_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: role.as_str().into(),
            joined_at: Utc::now().naive_utc(),
        };
        assert!(needs_promotion(&member(Role::Member)));
        assert!(!needs_promotion(&member(Role::Manager)));
        assert!(!needs_promotion(&member(Role::Admin)));
    }

    #[test]
    fn test_deadline_window() {
        let now = Utc::now().naive_utc();
        assert!(check_deadline(now + Duration::hours(1), now).is_ok());
        assert!(check_deadline(now, now).is_err());
        assert!(check_deadline(now + Duration::days(31), now).is_err());
    }
}
