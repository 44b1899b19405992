//! Property-based tests for score weighting and the job lifecycle

use proptest::prelude::*;
use seo_audit::analysis::scoring::parse_scores;
use seo_audit::analysis::{CategoryScores, overall_score};
use seo_audit::jobs::{JobStateMachine, JobStatus, MemoryJobStore};
use std::sync::Arc;
use url::Url;

fn category_scores() -> impl Strategy<Value = CategoryScores> {
    (
        proptest::option::of(0u8..=100),
        proptest::option::of(0u8..=100),
        proptest::option::of(0u8..=100),
        proptest::option::of(0u8..=100),
        proptest::option::of(0u8..=100),
    )
        .prop_map(|(technical, content, performance, ux, accessibility)| CategoryScores {
            technical,
            content,
            performance,
            ux,
            accessibility,
        })
}

fn present(scores: &CategoryScores) -> Vec<u8> {
    [
        scores.technical,
        scores.content,
        scores.performance,
        scores.ux,
        scores.accessibility,
    ]
    .into_iter()
    .flatten()
    .collect()
}

proptest! {
    #[test]
    fn overall_lies_between_present_scores(scores in category_scores()) {
        let overall = overall_score(&scores);
        let values = present(&scores);
        match (values.iter().min(), values.iter().max()) {
            (Some(min), Some(max)) => {
                prop_assert!(overall >= *min && overall <= *max);
            }
            _ => prop_assert_eq!(overall, 0),
        }
    }

    #[test]
    fn uniform_scores_give_that_score(score in 0u8..=100, mask in 1u8..32) {
        let pick = |bit: u8| (mask & (1 << bit) != 0).then_some(score);
        let scores = CategoryScores {
            technical: pick(0),
            content: pick(1),
            performance: pick(2),
            ux: pick(3),
            accessibility: pick(4),
        };
        prop_assert_eq!(overall_score(&scores), score);
    }

    #[test]
    fn score_parsing_never_exceeds_range(text in ".{0,200}") {
        if let Some(scores) = parse_scores(&text) {
            for value in present(&scores) {
                prop_assert!(value <= 100);
            }
        }
    }

    #[test]
    fn parsed_numbers_are_clamped(technical in -500i64..500, content in -500i64..500) {
        let reply = format!("{{\"technical\": {technical}, \"content\": {content}}}");
        let scores = parse_scores(&reply).unwrap();
        prop_assert_eq!(scores.technical, Some(technical.clamp(0, 100) as u8));
        prop_assert_eq!(scores.content, Some(content.clamp(0, 100) as u8));
    }

    #[test]
    fn terminal_jobs_never_change(ops in proptest::collection::vec(0u8..6, 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let machine = JobStateMachine::new(Arc::new(MemoryJobStore::new()));
            let job = machine
                .create(&Url::parse("https://example.com").unwrap(), Vec::new())
                .await
                .unwrap();

            let mut terminal: Option<JobStatus> = None;
            let mut last_progress = 0;
            for op in ops {
                // Invalid edges are errors and leave the job untouched
                let _ = match op {
                    0 => machine.transition(&job.id, JobStatus::Crawling, 20, "crawling").await,
                    1 => machine.transition(&job.id, JobStatus::Analyzing, 50, "analyzing").await,
                    2 => machine.transition(&job.id, JobStatus::Crawling, 10, "crawling").await,
                    3 => machine.fail(&job.id, "boom").await,
                    4 => machine.cancel(&job.id).await,
                    _ => machine.transition(&job.id, JobStatus::Pending, 0, "queued").await,
                };

                let current = machine.get(&job.id).await.unwrap();
                if let Some(status) = terminal {
                    assert_eq!(current.status, status);
                } else if current.status.is_terminal() {
                    terminal = Some(current.status);
                } else {
                    assert!(current.progress >= last_progress);
                    last_progress = current.progress;
                }
                assert!(current.result.is_none());
                assert_eq!(current.error.is_some(), current.status == JobStatus::Failed);
            }
        });
    }
}
