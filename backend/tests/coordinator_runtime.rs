mod common;

use std::{sync::Arc, time::Duration};

use common::{ScriptedScheduler, ScriptedSearch, candidate, initial_viewport, spawn_coordinator};
use ridehail_backend::{
    error::{CoordinatorError, ValidationError},
    runtime::CoordinatorConfig,
};
use shared::{Coordinate, Notice, RideRequestState};

fn config() -> CoordinatorConfig {
    CoordinatorConfig::default()
}

fn idle_scheduler() -> Arc<ScriptedScheduler> {
    Arc::new(ScriptedScheduler::confirming(Duration::ZERO))
}

#[tokio::test(start_paused = true)]
async fn rapid_typing_sends_one_search_with_last_text() {
    let search = Arc::new(ScriptedSearch::new());
    let handle = spawn_coordinator(search.clone(), idle_scheduler(), config());

    for text in ["5", "5t", "5th", "5th A", "5th Ave"] {
        handle.update_query(text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(search.calls().is_empty());

    let mut snapshots = handle.subscribe();
    snapshots
        .wait_for(|snapshot| !snapshot.candidates.is_empty())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(search.calls(), vec!["5th Ave".to_string()]);
    assert_eq!(handle.snapshot().candidates[0].label, "5th Ave");
}

#[tokio::test(start_paused = true)]
async fn slow_response_to_older_query_is_discarded() {
    let search = Arc::new(
        ScriptedSearch::new()
            .delay("Broadway", Duration::from_secs(2))
            .delay("Bleecker", Duration::from_millis(100)),
    );
    let handle = spawn_coordinator(search.clone(), idle_scheduler(), config());

    handle.update_query("Broadway").await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(search.calls(), vec!["Broadway".to_string()]);
    assert!(handle.snapshot().searching);

    handle.update_query("Bleecker").await.unwrap();
    assert!(!handle.snapshot().searching);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snapshot = handle.snapshot();
    assert_eq!(search.calls().len(), 2);
    assert_eq!(snapshot.candidates.len(), 1);
    assert_eq!(snapshot.candidates[0].label, "Bleecker");
    assert!(!snapshot.searching);
}

#[tokio::test(start_paused = true)]
async fn unresponsive_provider_times_out() {
    let search = Arc::new(ScriptedSearch::new().delay("slow", Duration::from_secs(60)));
    let handle = spawn_coordinator(search, idle_scheduler(), config());

    handle.update_query("slow").await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.notice, Some(Notice::SearchTimeout));
    assert!(!snapshot.searching);
    assert!(snapshot.candidates.is_empty());
    assert_eq!(snapshot.query, "slow");
}

#[tokio::test(start_paused = true)]
async fn provider_failure_surfaces_notice_and_keeps_query() {
    let search = Arc::new(ScriptedSearch::new().failing("Main St"));
    let handle = spawn_coordinator(search, idle_scheduler(), config());

    handle.update_query("Main St").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = handle.snapshot();
    assert!(matches!(snapshot.notice, Some(Notice::SearchFailed { .. })));
    assert!(snapshot.candidates.is_empty());
    assert_eq!(snapshot.query, "Main St");
}

#[tokio::test(start_paused = true)]
async fn clearing_query_drops_candidates_without_searching() {
    let search = Arc::new(ScriptedSearch::new());
    let handle = spawn_coordinator(search.clone(), idle_scheduler(), config());

    handle.update_query("Canal").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.snapshot().candidates.len(), 1);

    handle.update_query("").await.unwrap();
    assert!(handle.snapshot().candidates.is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(search.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn selecting_a_candidate_recenters_and_clears() {
    let search = Arc::new(ScriptedSearch::new().results(
        "5th Ave",
        vec![candidate("1", "5th Ave, NYC", 40.77, -73.97)],
    ));
    let handle = spawn_coordinator(search, idle_scheduler(), config());

    handle.update_query("5th Ave").await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let chosen = handle.snapshot().candidates[0].clone();
    assert_eq!(chosen.id, "1");

    handle.select_candidate(chosen).await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.viewport.center(), Coordinate::new(40.77, -73.97));
    assert_eq!(snapshot.viewport.span(), initial_viewport().span());
    assert!(snapshot.candidates.is_empty());
    assert_eq!(snapshot.draft.pickup, "5th Ave, NYC");
}

#[tokio::test(start_paused = true)]
async fn selection_cancels_pending_search() {
    let search = Arc::new(ScriptedSearch::new());
    let handle = spawn_coordinator(search.clone(), idle_scheduler(), config());

    handle.update_query("Penn").await.unwrap();
    handle
        .select_candidate(candidate("9", "Penn Station", 40.75, -73.99))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(search.calls().is_empty());
    assert!(handle.snapshot().candidates.is_empty());
}

#[tokio::test(start_paused = true)]
async fn current_location_failure_leaves_viewport() {
    let handle = spawn_coordinator(Arc::new(ScriptedSearch::new()), idle_scheduler(), config());

    let err = handle.recenter_on_current_location().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::LocationUnavailable(_)));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.viewport, initial_viewport());
    assert!(matches!(
        snapshot.notice,
        Some(Notice::LocationUnavailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn stalled_position_lookup_gives_up() {
    let search = Arc::new(ScriptedSearch::new().position_hangs());
    let handle = spawn_coordinator(search, idle_scheduler(), config());

    let outcome = tokio::time::timeout(
        Duration::from_secs(60),
        handle.recenter_on_current_location(),
    )
    .await
    .expect("position lookup is bounded");
    assert!(matches!(
        outcome,
        Err(CoordinatorError::LocationUnavailable(_))
    ));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.viewport, initial_viewport());
    assert!(matches!(
        snapshot.notice,
        Some(Notice::LocationUnavailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn current_location_recenters_viewport() {
    let search = Arc::new(ScriptedSearch::new().position(Coordinate::new(40.75, -73.98)));
    let handle = spawn_coordinator(search, idle_scheduler(), config());

    let center = handle.recenter_on_current_location().await.unwrap();
    assert_eq!(center, Coordinate::new(40.75, -73.98));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.viewport.center(), center);
    assert_eq!(snapshot.viewport.span(), initial_viewport().span());
}

#[tokio::test(start_paused = true)]
async fn double_submit_schedules_once() {
    let scheduler = Arc::new(ScriptedScheduler::confirming(Duration::from_secs(1)));
    let handle = spawn_coordinator(Arc::new(ScriptedSearch::new()), scheduler.clone(), config());
    handle.set_pickup("A").await.unwrap();
    handle.set_dropoff("B").await.unwrap();

    let (first, second) = tokio::join!(handle.submit_ride(), handle.submit_ride());
    let results = [first, second];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(CoordinatorError::AlreadyInProgress)))
            .count(),
        1
    );
    assert_eq!(scheduler.calls(), 1);
    assert!(matches!(
        handle.snapshot().state,
        RideRequestState::Scheduled { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn edits_are_rejected_while_submitting() {
    let scheduler = Arc::new(ScriptedScheduler::confirming(Duration::from_secs(5)));
    let handle = spawn_coordinator(Arc::new(ScriptedSearch::new()), scheduler, config());
    handle.set_pickup("A").await.unwrap();
    handle.set_dropoff("B").await.unwrap();

    let submitting = tokio::spawn({
        let handle = handle.clone();
        async move { handle.submit_ride().await }
    });
    handle
        .subscribe()
        .wait_for(|snapshot| snapshot.state == RideRequestState::Submitting)
        .await
        .unwrap();

    assert_eq!(
        handle.set_pickup("C").await.unwrap_err(),
        CoordinatorError::AlreadyInProgress
    );

    let confirmation = submitting.await.unwrap().unwrap();
    assert_eq!(confirmation.pickup, "A");
    assert_eq!(handle.snapshot().draft.pickup, "A");
}

#[tokio::test(start_paused = true)]
async fn incomplete_draft_never_reaches_scheduler() {
    let scheduler = idle_scheduler();
    let handle = spawn_coordinator(Arc::new(ScriptedSearch::new()), scheduler.clone(), config());
    handle.set_pickup("123 Main St").await.unwrap();
    handle.set_dropoff("").await.unwrap();

    let err = handle.submit_ride().await.unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::Validation(ValidationError::MissingDropoff)
    );
    assert_eq!(handle.snapshot().state, RideRequestState::Idle);
    assert_eq!(scheduler.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn scheduling_failure_is_cleared_by_edit() {
    let scheduler = Arc::new(ScriptedScheduler::failing("no drivers"));
    let handle = spawn_coordinator(Arc::new(ScriptedSearch::new()), scheduler, config());
    handle.set_pickup("A").await.unwrap();
    handle.set_dropoff("B").await.unwrap();

    let err = handle.submit_ride().await.unwrap_err();
    assert_eq!(err, CoordinatorError::Scheduling("no drivers".into()));
    assert_eq!(
        handle.snapshot().state,
        RideRequestState::Failed {
            reason: "no drivers".into()
        }
    );

    handle.set_pickup("A2").await.unwrap();
    assert_eq!(handle.snapshot().state, RideRequestState::Idle);
}
