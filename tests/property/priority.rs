//! Property-based tests for backfill priority scoring

use benchline::backfill::priority::score_breakdown;
use benchline::backfill::{candidate_order, Candidate, PriorityTier};
use benchline::model::{Project, ProjectStatus};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::cmp::Ordering;

fn status_strategy() -> impl Strategy<Value = ProjectStatus> {
    prop_oneof![
        Just(ProjectStatus::Active),
        Just(ProjectStatus::Draft),
        Just(ProjectStatus::Paused),
        Just(ProjectStatus::Archived),
    ]
}

fn contact_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("owner@acme.io".to_string())),
        Just(Some("test@example.com".to_string())),
        Just(Some("noreply@acme.io".to_string())),
        "[a-z]{1,8}@[a-z]{1,8}\\.io".prop_map(Some),
    ]
}

fn project_strategy() -> impl Strategy<Value = Project> {
    (
        "[a-z]{1,6}",
        status_strategy(),
        0usize..12,
        any::<bool>(),
        0i64..400,
        contact_strategy(),
    )
        .prop_map(|(id, status, peers, subject, age_days, contact)| Project {
            id: format!("proj-{}", id),
            name: id.clone(),
            status,
            created_at: fixed_now() - Duration::days(age_days),
            owner_contact: contact,
            peer_ids: (0..peers).map(|i| format!("peer-{}", i)).collect(),
            subject_id: subject.then(|| format!("subject-{}", id)),
        })
}

fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_score_is_bounded_and_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(&project_strategy(), |project| {
            let first = score_breakdown(&project, fixed_now());
            let second = score_breakdown(&project, fixed_now());
            prop_assert_eq!(first, second);
            prop_assert!(first.total() <= 100);
            if project.status == ProjectStatus::Archived {
                prop_assert_eq!(first.status, 0);
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_tier_follows_thresholds() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(
            &(project_strategy(), 0u8..=100, 0u8..=100),
            |(project, a, b)| {
                let (medium, high) = if a <= b { (a, b) } else { (b, a) };
                let candidate = Candidate::from_project(&project, fixed_now(), high, medium);
                let expected = if candidate.score >= high {
                    PriorityTier::High
                } else if candidate.score >= medium {
                    PriorityTier::Medium
                } else {
                    PriorityTier::Low
                };
                prop_assert_eq!(candidate.tier, expected);
                prop_assert_eq!(candidate.score, candidate.breakdown.total());
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn test_candidate_order_sorts_by_score_descending() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(
            &proptest::collection::vec(project_strategy(), 0..20),
            |projects| {
                let mut candidates: Vec<Candidate> = projects
                    .iter()
                    .map(|p| Candidate::from_project(p, fixed_now(), 70, 40))
                    .collect();
                candidates.sort_by(candidate_order);

                for pair in candidates.windows(2) {
                    prop_assert!(pair[0].score >= pair[1].score);
                    prop_assert_ne!(candidate_order(&pair[0], &pair[1]), Ordering::Greater);
                    prop_assert_eq!(
                        candidate_order(&pair[0], &pair[1]),
                        candidate_order(&pair[1], &pair[0]).reverse()
                    );
                }
                Ok(())
            },
        )
        .unwrap();
}
