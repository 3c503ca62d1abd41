//! Validation and planning for bulk deactivation.
//!
//! Both steps are pure: they work on a roster snapshot and the affected pull
//! requests loaded by the caller inside its unit of work, so nothing is
//! written until the whole plan is known to be valid.

use std::collections::BTreeSet;

use rand::Rng;

use super::select_reviewers;
use crate::errors::AppError;
use crate::models::{ReviewerReassignment, Team, TeamMember};

/// An open pull request reviewed by at least one user being deactivated.
#[derive(Debug, Clone)]
pub struct AffectedPullRequest {
    pub pr_id: String,
    pub author_id: String,
    /// Current reviewers in assignment order
    pub reviewers: Vec<String>,
}

/// Reject requests that would empty the team or name outsiders.
pub fn validate_deactivation(team: &Team, user_ids: &[String]) -> Result<(), AppError> {
    let members: BTreeSet<&str> = team.members.iter().map(|m| m.user_id.as_str()).collect();
    let requested: BTreeSet<&str> = user_ids.iter().map(String::as_str).collect();

    if requested == members {
        return Err(AppError::InvalidRequest(format!(
            "cannot deactivate all members of team {}: team would be left without reviewers",
            team.team_name
        )));
    }

    if let Some(outsider) = user_ids.iter().find(|id| !team.has_member(id)) {
        return Err(AppError::InvalidRequest(format!(
            "user {} is not a member of team {}",
            outsider, team.team_name
        )));
    }

    Ok(())
}

/// Plan the replacement of every deactivated reviewer on the given pull
/// requests, in the order they are given.
///
/// Replacements come from active team members who are not being deactivated,
/// are not the author and are not already reviewing that pull request. When
/// the pool runs short the remaining entries carry no successor. A pull
/// request that would end up with no reviewers at all fails the whole plan
/// with `NoCandidate`.
pub fn build_reassignment_plan<R: Rng + ?Sized>(
    team: &Team,
    deactivating: &[String],
    prs: &[AffectedPullRequest],
    rng: &mut R,
) -> Result<Vec<ReviewerReassignment>, AppError> {
    let leaving: BTreeSet<&str> = deactivating.iter().map(String::as_str).collect();
    let available: Vec<&TeamMember> = team
        .members
        .iter()
        .filter(|m| m.is_active && !leaving.contains(m.user_id.as_str()))
        .collect();

    let mut plan = Vec::new();
    for pr in prs {
        let to_replace: Vec<&String> = pr
            .reviewers
            .iter()
            .filter(|r| leaving.contains(r.as_str()))
            .collect();
        if to_replace.is_empty() {
            continue;
        }

        let pool: Vec<TeamMember> = available
            .iter()
            .filter(|m| !pr.reviewers.contains(&m.user_id))
            .map(|m| (*m).clone())
            .collect();
        let picked = select_reviewers(&pool, &pr.author_id, to_replace.len(), rng);

        let remaining = pr.reviewers.len() - to_replace.len() + picked.len();
        if remaining == 0 {
            return Err(AppError::NoCandidate(format!(
                "PR {} would be left without reviewers",
                pr.pr_id
            )));
        }

        for (i, old) in to_replace.into_iter().enumerate() {
            plan.push(ReviewerReassignment {
                pr_id: pr.pr_id.clone(),
                old_reviewer_id: old.clone(),
                new_reviewer_id: picked.get(i).cloned(),
            });
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn team(members: &[(&str, bool)]) -> Team {
        Team {
            team_name: "backend".into(),
            members: members
                .iter()
                .map(|(id, active)| TeamMember {
                    user_id: id.to_string(),
                    username: id.to_string(),
                    is_active: *active,
                })
                .collect(),
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn pr(id: &str, author: &str, reviewers: &[&str]) -> AffectedPullRequest {
        AffectedPullRequest {
            pr_id: id.into(),
            author_id: author.into(),
            reviewers: ids(reviewers),
        }
    }

    #[test]
    fn test_validate_rejects_full_roster() {
        let t = team(&[("u1", true), ("u2", true)]);
        let err = validate_deactivation(&t, &ids(&["u2", "u1"])).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_rejects_outsider() {
        let t = team(&[("u1", true), ("u2", true), ("u3", true)]);
        let err = validate_deactivation(&t, &ids(&["u1", "zed"])).unwrap_err();
        assert_eq!(
            err,
            AppError::InvalidRequest("user zed is not a member of team backend".into())
        );
    }

    #[test]
    fn test_validate_accepts_strict_subset() {
        let t = team(&[("u1", true), ("u2", true), ("u3", false)]);
        assert!(validate_deactivation(&t, &ids(&["u3"])).is_ok());
    }

    #[test]
    fn test_plan_replaces_with_fresh_reviewer() {
        let t = team(&[("u1", true), ("u2", true), ("u3", true), ("u4", true)]);
        let prs = vec![pr("pr-1", "u1", &["u2", "u3"])];
        let mut rng = StdRng::seed_from_u64(3);

        let plan = build_reassignment_plan(&t, &ids(&["u2"]), &prs, &mut rng).unwrap();

        assert_eq!(
            plan,
            vec![ReviewerReassignment {
                pr_id: "pr-1".into(),
                old_reviewer_id: "u2".into(),
                new_reviewer_id: Some("u4".into()),
            }]
        );
    }

    #[test]
    fn test_plan_removes_without_successor_when_pool_is_dry() {
        // u3 stays on the PR, u4 is inactive, u1 is the author.
        let t = team(&[("u1", true), ("u2", true), ("u3", true), ("u4", false)]);
        let prs = vec![pr("pr-1", "u1", &["u2", "u3"])];
        let mut rng = StdRng::seed_from_u64(3);

        let plan = build_reassignment_plan(&t, &ids(&["u2"]), &prs, &mut rng).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].new_reviewer_id, None);
    }

    #[test]
    fn test_plan_fails_when_pr_would_be_unreviewed() {
        let t = team(&[("u1", true), ("u2", true), ("u3", true)]);
        let prs = vec![
            pr("pr-1", "u3", &["u1"]),
            pr("pr-2", "u1", &["u2", "u3"]),
        ];
        let mut rng = StdRng::seed_from_u64(3);

        let err = build_reassignment_plan(&t, &ids(&["u2", "u3"]), &prs, &mut rng).unwrap_err();

        assert_eq!(
            err,
            AppError::NoCandidate("PR pr-2 would be left without reviewers".into())
        );
    }

    #[test]
    fn test_plan_skips_prs_without_leaving_reviewers() {
        let t = team(&[("u1", true), ("u2", true), ("u3", true)]);
        let prs = vec![pr("pr-1", "u1", &["u3"])];
        let mut rng = StdRng::seed_from_u64(3);

        let plan = build_reassignment_plan(&t, &ids(&["u2"]), &prs, &mut rng).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_is_reproducible_for_a_seed() {
        let t = team(&[
            ("u1", true),
            ("u2", true),
            ("u3", true),
            ("u4", true),
            ("u5", true),
            ("u6", true),
        ]);
        let prs = vec![pr("pr-1", "u1", &["u2", "u3"]), pr("pr-2", "u4", &["u2"])];

        let first =
            build_reassignment_plan(&t, &ids(&["u2"]), &prs, &mut StdRng::seed_from_u64(11))
                .unwrap();
        let second =
            build_reassignment_plan(&t, &ids(&["u2"]), &prs, &mut StdRng::seed_from_u64(11))
                .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        for step in &first {
            let new_id = step.new_reviewer_id.as_deref().unwrap();
            assert_ne!(new_id, "u2");
        }
    }
}
