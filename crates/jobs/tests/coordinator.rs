//! End-to-end coordinator scenarios: background continuation, cancellation,
//! rate-limit decisions and slide-scoped chat, in virtual time.

mod common;

use common::{delayed, exhausted, ok, ScriptedTransport, FLASHCARDS};
use lq_domain::artifact::ArtifactKind;
use lq_domain::config::Config;
use lq_domain::content::{Part, Role};
use lq_domain::job::JobResult;
use lq_domain::tier::ModelTier;
use lq_jobs::{
    JobCoordinator, JobInput, JobOutcome, RateLimitChoice, Reopened, StatusSnapshot, StatusState,
    SubmitError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn coordinator(steps: Vec<common::Step>) -> (JobCoordinator, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new(steps);
    let coord = JobCoordinator::new(&Config::default(), transport.clone());
    (coord, transport)
}

async fn wait_for(coord: &JobCoordinator, kind: ArtifactKind, state: StatusState) -> StatusSnapshot {
    for _ in 0..10_000 {
        let status = coord.status(kind);
        if status.state == state {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("{kind} never reached {state:?}: {:?}", coord.status(kind));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Foreground and background
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn foreground_result_goes_to_the_handle() {
    let (coord, transport) = coordinator(vec![ok(FLASHCARDS)]);
    let mut handle = coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards for lecture 4"))
        .unwrap();

    match handle.wait().await {
        Some(JobOutcome::Completed(JobResult::Records(records))) => assert_eq!(records.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    assert!(transport.requests()[0].payload.json_mode);
    assert!(matches!(coord.open(ArtifactKind::Flashcards), Reopened::Idle));
}

#[tokio::test(start_paused = true)]
async fn dismissed_job_finishes_into_the_cache() {
    let (coord, _transport) = coordinator(vec![delayed(10, ok(FLASHCARDS))]);
    let mut handle = coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards"))
        .unwrap();
    assert!(coord.dismiss(ArtifactKind::Flashcards));

    let status = coord.status(ArtifactKind::Flashcards);
    assert_eq!(status.state, StatusState::Generating);
    assert!(status.background);

    wait_for(&coord, ArtifactKind::Flashcards, StatusState::Ready).await;
    assert_eq!(handle.wait().await, None);

    match coord.open(ArtifactKind::Flashcards) {
        Reopened::Ready(artifact) => {
            assert_eq!(artifact.job_id, handle.job_id());
            assert_eq!(artifact.result.records().map(<[_]>::len), Some(2));
        }
        _ => panic!("expected the cached result"),
    }
    assert_eq!(coord.status(ArtifactKind::Flashcards).state, StatusState::Idle);
}

#[tokio::test(start_paused = true)]
async fn one_active_job_per_kind() {
    let (coord, _transport) = coordinator(vec![
        delayed(30, ok(FLASHCARDS)),
        delayed(30, ok(FLASHCARDS)),
    ]);
    let quiz = coord.submit(ArtifactKind::Quiz, JobInput::new("quiz")).unwrap();

    assert_eq!(
        coord.submit(ArtifactKind::Quiz, JobInput::new("again")).err(),
        Some(SubmitError::AlreadyRunning(ArtifactKind::Quiz))
    );
    assert!(coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards"))
        .is_ok());

    coord.dismiss(ArtifactKind::Quiz);
    let rejoined = coord.submit(ArtifactKind::Quiz, JobInput::new("quiz")).unwrap();
    assert_eq!(rejoined.job_id(), quiz.job_id());
    assert!(!coord.status(ArtifactKind::Quiz).background);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_a_foreground_job() {
    let (coord, _transport) = coordinator(vec![delayed(30, ok("answer"))]);
    let mut handle = coord.submit(ArtifactKind::Chat, JobInput::new("hi")).unwrap();

    assert!(coord.cancel(&handle));
    assert_eq!(handle.wait().await, Some(JobOutcome::Cancelled));
    assert_eq!(coord.status(ArtifactKind::Chat).state, StatusState::Idle);
}

#[tokio::test(start_paused = true)]
async fn background_jobs_cannot_be_cancelled() {
    let (coord, _transport) = coordinator(vec![delayed(30, ok("a summary"))]);
    let handle = coord
        .submit(ArtifactKind::Summary, JobInput::new("summarise"))
        .unwrap();
    coord.dismiss(ArtifactKind::Summary);

    assert!(!coord.cancel(&handle));
    assert!(!coord.cancel_kind(ArtifactKind::Summary));
    wait_for(&coord, ArtifactKind::Summary, StatusState::Ready).await;
}

#[tokio::test(start_paused = true)]
async fn status_reports_eta_while_generating() {
    let (coord, _transport) = coordinator(vec![delayed(200, ok("a summary"))]);
    let _handle = coord
        .submit(ArtifactKind::Summary, JobInput::new("summarise"))
        .unwrap();

    let status = coord.status(ArtifactKind::Summary);
    assert_eq!(status.state, StatusState::Generating);
    assert_eq!(status.eta_seconds, Some(90));
    assert_eq!(status.tier, Some(ModelTier::Primary));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(coord.status(ArtifactKind::Summary).eta_seconds, Some(60));
}

#[tokio::test(start_paused = true)]
async fn background_failure_is_reported_on_open() {
    let steps = (0..6).map(|_| ok("no structured data here")).collect();
    let (coord, _transport) = coordinator(steps);
    coord.submit(ArtifactKind::Quiz, JobInput::new("quiz")).unwrap();
    coord.dismiss(ArtifactKind::Quiz);

    let status = wait_for(&coord, ArtifactKind::Quiz, StatusState::Failed).await;
    assert!(status.message.is_some());
    match coord.open(ArtifactKind::Quiz) {
        Reopened::Failed(msg) => assert!(msg.contains("after 5 retries"), "{msg}"),
        _ => panic!("expected a failure"),
    }
    assert_eq!(coord.status(ArtifactKind::Quiz).state, StatusState::Idle);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate-limit decisions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn accepting_the_lower_tier_resumes_and_sticks() {
    let (coord, transport) = coordinator(vec![
        exhausted("quota"),
        exhausted("quota"),
        exhausted("Please retry in 20s."),
        ok(FLASHCARDS),
        ok(FLASHCARDS),
    ]);
    coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards"))
        .unwrap();
    coord.dismiss(ArtifactKind::Flashcards);

    let status = wait_for(&coord, ArtifactKind::Flashcards, StatusState::RateLimited).await;
    assert!(status.rate_limited);
    assert_eq!(
        coord.submit(ArtifactKind::Flashcards, JobInput::new("cards")).err(),
        Some(SubmitError::RateLimitDecisionPending(ArtifactKind::Flashcards))
    );
    assert!(matches!(
        coord.open(ArtifactKind::Flashcards),
        Reopened::RateLimitDecision {
            retry_after_secs: 20
        }
    ));

    let mut resumed = coord
        .resolve_rate_limit(ArtifactKind::Flashcards, RateLimitChoice::AcceptLowerTier)
        .unwrap()
        .unwrap();
    assert!(matches!(resumed.wait().await, Some(JobOutcome::Completed(_))));
    assert_eq!(coord.sticky_tier(), Some(ModelTier::Tertiary));

    let mut next = coord
        .submit(ArtifactKind::Flashcards, JobInput::new("more cards"))
        .unwrap();
    assert!(matches!(next.wait().await, Some(JobOutcome::Completed(_))));
    assert_eq!(
        transport.models(),
        vec![
            "gemini-2.5-pro",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
            "gemini-2.5-flash-lite",
            "gemini-2.5-flash-lite",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn retry_later_waits_and_keeps_a_chosen_tier() {
    let (coord, _transport) = coordinator(vec![
        exhausted("quota"),
        exhausted("Please retry in 20s."),
        ok("checklist, as prose"),
        ok(r#"[{"item": "a"}, {"item": "b"}, {"item": "c"}, {"item": "d"}, {"item": "e"}]"#),
    ]);
    coord.set_sticky_tier(Some(ModelTier::Secondary));
    coord
        .submit(ArtifactKind::Checklist, JobInput::new("checklist"))
        .unwrap();
    coord.dismiss(ArtifactKind::Checklist);
    wait_for(&coord, ArtifactKind::Checklist, StatusState::RateLimited).await;

    let start = Instant::now();
    let mut handle = coord
        .resolve_rate_limit(ArtifactKind::Checklist, RateLimitChoice::RetryLater)
        .unwrap()
        .unwrap();
    assert_eq!(coord.sticky_tier(), Some(ModelTier::Secondary));

    tokio::time::sleep(Duration::from_secs(1)).await;
    let status = coord.status(ArtifactKind::Checklist);
    assert!(status.rate_limited);
    assert_eq!(status.eta_seconds, Some(19));

    assert!(matches!(handle.wait().await, Some(JobOutcome::Completed(_))));
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert_eq!(
        coord.resolve_rate_limit(ArtifactKind::Checklist, RateLimitChoice::RetryLater).err(),
        Some(SubmitError::NothingToResume(ArtifactKind::Checklist))
    );
}

#[tokio::test(start_paused = true)]
async fn retry_later_drops_an_accepted_downgrade() {
    let (coord, transport) = coordinator(vec![
        exhausted("quota"),
        exhausted("quota"),
        exhausted("quota"),
        ok(FLASHCARDS),
        exhausted("Please retry in 10s."),
        ok(FLASHCARDS),
    ]);
    coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards"))
        .unwrap();
    coord.dismiss(ArtifactKind::Flashcards);
    wait_for(&coord, ArtifactKind::Flashcards, StatusState::RateLimited).await;
    let mut resumed = coord
        .resolve_rate_limit(ArtifactKind::Flashcards, RateLimitChoice::AcceptLowerTier)
        .unwrap()
        .unwrap();
    assert!(matches!(resumed.wait().await, Some(JobOutcome::Completed(_))));

    coord
        .submit(ArtifactKind::Flashcards, JobInput::new("more cards"))
        .unwrap();
    coord.dismiss(ArtifactKind::Flashcards);
    wait_for(&coord, ArtifactKind::Flashcards, StatusState::RateLimited).await;
    let mut retried = coord
        .resolve_rate_limit(ArtifactKind::Flashcards, RateLimitChoice::RetryLater)
        .unwrap()
        .unwrap();
    assert_eq!(coord.sticky_tier(), None);
    assert!(matches!(retried.wait().await, Some(JobOutcome::Completed(_))));
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn declining_a_halt_fails_the_kind_until_opened() {
    let (coord, transport) = coordinator(vec![
        exhausted("quota"),
        exhausted("quota"),
        exhausted("Please retry in 20s."),
        ok(FLASHCARDS),
    ]);
    coord
        .submit(ArtifactKind::Quiz, JobInput::new("quiz"))
        .unwrap();
    coord.dismiss(ArtifactKind::Quiz);
    wait_for(&coord, ArtifactKind::Quiz, StatusState::RateLimited).await;

    let declined = coord
        .resolve_rate_limit(ArtifactKind::Quiz, RateLimitChoice::Decline)
        .unwrap();
    assert!(declined.is_none());
    assert_eq!(coord.status(ArtifactKind::Quiz).state, StatusState::Failed);
    assert_eq!(
        coord
            .resolve_rate_limit(ArtifactKind::Quiz, RateLimitChoice::RetryLater)
            .err(),
        Some(SubmitError::NothingToResume(ArtifactKind::Quiz))
    );
    match coord.open(ArtifactKind::Quiz) {
        Reopened::Failed(msg) => assert!(msg.contains("declined"), "{msg}"),
        _ => panic!("expected a failure"),
    }
    assert_eq!(coord.status(ArtifactKind::Quiz).state, StatusState::Idle);
    assert_eq!(transport.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn newer_foreground_result_replaces_the_cached_one() {
    const NEWER: &str = r#"[{"front": "NEW", "back": "card"}]"#;
    let (coord, _transport) = coordinator(vec![ok(FLASHCARDS), ok(NEWER)]);
    coord
        .submit(ArtifactKind::Flashcards, JobInput::new("cards"))
        .unwrap();
    coord.dismiss(ArtifactKind::Flashcards);
    wait_for(&coord, ArtifactKind::Flashcards, StatusState::Ready).await;

    let mut handle = coord
        .submit(ArtifactKind::Flashcards, JobInput::new("again"))
        .unwrap();
    match handle.wait().await {
        Some(JobOutcome::Completed(JobResult::Records(records))) => {
            assert_eq!(records[0]["front"], "NEW")
        }
        other => panic!("unexpected {other:?}"),
    }
    wait_for(&coord, ArtifactKind::Flashcards, StatusState::Idle).await;
    assert!(matches!(coord.open(ArtifactKind::Flashcards), Reopened::Idle));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slide-scoped chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn chat_is_recorded_under_the_current_slide() {
    let (coord, transport) = coordinator(vec![
        ok("Two layers of phospholipids."),
        ok("Proteins embedded in it."),
        ok("Chlorophyll absorbs light."),
    ]);
    let membrane = coord.observe_slide_text("Cell membrane structure lipid bilayer");

    let mut h = coord
        .submit(ArtifactKind::Chat, JobInput::new("what is a bilayer?"))
        .unwrap();
    h.wait().await;
    let messages = coord.slide_messages(&membrane.group_id);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, "what is a bilayer?");

    let mut h = coord
        .submit(ArtifactKind::Chat, JobInput::new("what else is in it?"))
        .unwrap();
    h.wait().await;
    // Two context turns plus the new question.
    assert_eq!(transport.requests()[1].payload.contents.len(), 3);
    assert!(!transport.requests()[1].payload.json_mode);

    let photo = coord.observe_slide_text("Photosynthesis light reactions chloroplast");
    assert!(photo.created);
    let mut h = coord
        .submit(ArtifactKind::Chat, JobInput::new("what absorbs light?"))
        .unwrap();
    h.wait().await;
    // A fresh slide starts without the membrane conversation.
    assert_eq!(transport.requests()[2].payload.contents.len(), 1);
    assert_eq!(coord.slide_messages(&membrane.group_id).len(), 4);
    assert_eq!(coord.slide_messages(&photo.group_id).len(), 2);

    coord.clear_conversation();
    assert!(coord.current_slide().is_none());
}

#[tokio::test(start_paused = true)]
async fn uploaded_attachment_is_sent_before_the_prompt() {
    let (coord, transport) = coordinator(vec![ok("a summary")]);
    let part = coord
        .upload_attachment("notes.pdf", "application/pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();
    assert_eq!(
        part,
        Part::FileData {
            mime_type: "application/pdf".into(),
            file_uri: "https://files.test/notes.pdf".into(),
        }
    );

    let mut h = coord
        .submit(
            ArtifactKind::Summary,
            JobInput::new("summarise").with_attachment(part.clone()),
        )
        .unwrap();
    h.wait().await;
    let request = &transport.requests()[0];
    assert_eq!(request.payload.contents[0].parts, vec![part, Part::text("summarise")]);
}
