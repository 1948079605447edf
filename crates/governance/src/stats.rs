//! On-demand governance statistics.

use serde::Serialize;

use gurukul_identity::{ApplicationStatus, Principal};

/// Dashboard view over current directory state. Recomputed per request, not
/// maintained incrementally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernanceStats {
    pub total_gurus: usize,
    pub draft: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub suspended: usize,
    /// Share of decided applications that were approved (suspension still
    /// counts as an approval decision).
    pub approval_rate: f64,
    pub rejection_rate: f64,
    pub course_count: usize,
}

impl GovernanceStats {
    pub fn compute(gurus: &[Principal], course_count: usize) -> Self {
        let mut draft = 0;
        let mut pending = 0;
        let mut approved = 0;
        let mut rejected = 0;
        let mut suspended = 0;

        for guru in gurus {
            let Some(app) = &guru.application else {
                continue;
            };
            match app.status {
                ApplicationStatus::Draft => draft += 1,
                ApplicationStatus::Submitted | ApplicationStatus::UnderReview => pending += 1,
                ApplicationStatus::Approved => approved += 1,
                ApplicationStatus::Rejected => rejected += 1,
                ApplicationStatus::Suspended => suspended += 1,
            }
        }

        let decided = approved + suspended + rejected;
        let (approval_rate, rejection_rate) = if decided == 0 {
            (0.0, 0.0)
        } else {
            (
                (approved + suspended) as f64 / decided as f64,
                rejected as f64 / decided as f64,
            )
        };

        Self {
            total_gurus: gurus.len(),
            draft,
            pending,
            approved,
            rejected,
            suspended,
            approval_rate,
            rejection_rate,
            course_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gurukul_core::PrincipalId;
    use gurukul_identity::{ApplicationRecord, GuruProfile, Role};

    fn guru_with_status(status: ApplicationStatus) -> Principal {
        Principal {
            role: Role::Guru,
            application: Some(ApplicationRecord {
                status,
                ..ApplicationRecord::draft(GuruProfile::default())
            }),
            created: true,
            ..Principal::empty(PrincipalId::new())
        }
    }

    #[test]
    fn rates_cover_all_decided_applications() {
        let gurus = vec![
            guru_with_status(ApplicationStatus::Submitted),
            guru_with_status(ApplicationStatus::UnderReview),
            guru_with_status(ApplicationStatus::Approved),
            guru_with_status(ApplicationStatus::Approved),
            guru_with_status(ApplicationStatus::Suspended),
            guru_with_status(ApplicationStatus::Rejected),
        ];

        let stats = GovernanceStats::compute(&gurus, 42);
        assert_eq!(stats.total_gurus, 6);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 2);
        assert_eq!(stats.suspended, 1);
        assert_eq!(stats.rejected, 1);
        assert!((stats.approval_rate - 0.75).abs() < f64::EPSILON);
        assert!((stats.rejection_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(stats.course_count, 42);
    }

    #[test]
    fn no_decisions_means_zero_rates() {
        let gurus = vec![guru_with_status(ApplicationStatus::Submitted)];
        let stats = GovernanceStats::compute(&gurus, 0);
        assert_eq!(stats.approval_rate, 0.0);
        assert_eq!(stats.rejection_rate, 0.0);
    }
}
