use crate::rate_limit::RateLimiter;
use crate::services::{AuthService, InvitationService, VoteService};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info};

/// What one sweep removed or closed
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub sessions: u64,
    pub invitations: u64,
    pub votes_closed: usize,
    pub rate_buckets: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

/// Periodic cleanup of expired sessions, stale invitations, due votes and idle rate buckets
pub struct Housekeeper {
    auth: Arc<AuthService>,
    invitations: Arc<InvitationService>,
    votes: Arc<VoteService>,
    rate_limiter: Arc<RateLimiter>,
    interval: Duration,
}

impl Housekeeper {
    pub fn new(
        auth: Arc<AuthService>,
        invitations: Arc<InvitationService>,
        votes: Arc<VoteService>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            auth,
            invitations,
            votes,
            rate_limiter,
            interval: Duration::from_secs(60),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn start(self) {
        let mut interval = time::interval(self.interval);
        info!("Housekeeping started, sweeping every {:?}", self.interval);

        loop {
            interval.tick().await;
            let report = self.sweep().await;
            if report.is_empty() {
                debug!("Housekeeping sweep found nothing to do");
            } else {
                info!(
                    "Housekeeping: {} sessions, {} invitations purged; {} votes closed; {} rate buckets pruned",
                    report.sessions, report.invitations, report.votes_closed, report.rate_buckets
                );
            }
        }
    }

    /// Run every job once; a failing job is logged and the others still run
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.auth.purge_expired_sessions().await {
            Ok(n) => report.sessions = n,
            Err(e) => error!("Failed to purge expired sessions: {}", e),
        }
        match self.invitations.purge_stale().await {
            Ok(n) => report.invitations = n,
            Err(e) => error!("Failed to purge stale invitations: {}", e),
        }
        match self.votes.close_expired().await {
            Ok(n) => report.votes_closed = n,
            Err(e) => error!("Failed to close expired votes: {}", e),
        }
        report.rate_buckets = self.rate_limiter.prune().await;

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report() {
        assert!(SweepReport::default().is_empty());
        let report = SweepReport {
            votes_closed: 1,
            ..Default::default()
        };
        assert!(!report.is_empty());
    }
}
