use crate::error::RepoResult;
use crate::models::{Role, Vote, VoteBallot, VoteType};
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for room votes and their ballots
pub struct VoteRepository {
    pool: PgPool,
}

impl VoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        room_id: Uuid,
        title: &str,
        description: Option<&str>,
        vote_type: VoteType,
        options: &[String],
        ends_at: NaiveDateTime,
        created_by: Uuid,
    ) -> RepoResult<Vote> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (room_id, title, description, vote_type, options, ends_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, room_id, title, description, vote_type, options, status, result,
                      ends_at, created_by, created_at, closed_at
            "#,
        )
        .bind(room_id)
        .bind(title)
        .bind(description)
        .bind(vote_type.as_str())
        .bind(serde_json::json!(options))
        .bind(ends_at)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(vote)
    }

    pub async fn find_by_id(&self, room_id: Uuid, id: Uuid) -> RepoResult<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, room_id, title, description, vote_type, options, status, result,
                   ends_at, created_by, created_at, closed_at
            FROM votes
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vote)
    }

    pub async fn list(&self, room_id: Uuid) -> RepoResult<Vec<Vote>> {
        let votes = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, room_id, title, description, vote_type, options, status, result,
                   ends_at, created_by, created_at, closed_at
            FROM votes
            WHERE room_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }

    /// Open votes whose deadline has passed
    pub async fn list_expired(&self, now: NaiveDateTime) -> RepoResult<Vec<Vote>> {
        let votes = sqlx::query_as::<_, Vote>(
            r#"
            SELECT id, room_id, title, description, vote_type, options, status, result,
                   ends_at, created_by, created_at, closed_at
            FROM votes
            WHERE status = 'open' AND ends_at <= $1
            ORDER BY ends_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }

    /// Cast or replace a member's ballot
    pub async fn upsert_ballot(&self, vote_id: Uuid, user_id: Uuid, choice: &str) -> RepoResult<VoteBallot> {
        let ballot = sqlx::query_as::<_, VoteBallot>(
            r#"
            INSERT INTO vote_ballots (vote_id, user_id, choice)
            VALUES ($1, $2, $3)
            ON CONFLICT (vote_id, user_id) DO UPDATE
            SET choice = EXCLUDED.choice, cast_at = NOW()
            RETURNING vote_id, user_id, choice, cast_at
            "#,
        )
        .bind(vote_id)
        .bind(user_id)
        .bind(choice)
        .fetch_one(&self.pool)
        .await?;

        Ok(ballot)
    }

    pub async fn ballots(&self, vote_id: Uuid) -> RepoResult<Vec<VoteBallot>> {
        let ballots = sqlx::query_as::<_, VoteBallot>(
            r#"
            SELECT vote_id, user_id, choice, cast_at
            FROM vote_ballots
            WHERE vote_id = $1
            "#,
        )
        .bind(vote_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ballots)
    }

    /// Close an open vote with its result; None if it was already closed
    /// Close an open vote and, in the same transaction, give `promote`
    /// (user, role) its new role. Returns None when the vote was no longer
    /// open; the flag tells whether the promotion touched a member.
    pub async fn close(
        &self,
        id: Uuid,
        result: Option<&str>,
        promote: Option<(Uuid, Role)>,
    ) -> RepoResult<Option<(Vote, bool)>> {
        let mut tx = self.pool.begin().await?;

        let vote = sqlx::query_as::<_, Vote>(
            r#"
            UPDATE votes
            SET status = 'closed', result = $2, closed_at = NOW()
            WHERE id = $1 AND status = 'open'
            RETURNING id, room_id, title, description, vote_type, options, status, result,
                      ends_at, created_by, created_at, closed_at
            "#,
        )
        .bind(id)
        .bind(result)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(vote) = vote else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut promoted = false;
        if let Some((user_id, role)) = promote {
            promoted = sqlx::query(
                r#"
                UPDATE room_members
                SET role = $3
                WHERE room_id = $1 AND user_id = $2
                "#,
            )
            .bind(vote.room_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected()
                > 0;
        }

        tx.commit().await?;
        Ok(Some((vote, promoted)))
    }
}
