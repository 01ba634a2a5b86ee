//! End-to-end behaviour of commands, change events, the synchronizer and the list cache,
//! with every store replaced by an in-memory double.

mod common;

use std::time::Duration;

use time::macros::datetime;

use taskflow::application::error::TaskServiceError;
use taskflow::application::jobs::SYNC_JOB_MAX_ATTEMPTS;
use taskflow::application::repos::TaskReadRepo;
use taskflow::application::sync::SyncOutcome;
use taskflow::cache::TaskCache;
use taskflow::domain::error::DomainError;
use taskflow::domain::events::ChangeEvent;
use taskflow::domain::tasks::{NewTask, TaskPatch};
use taskflow::domain::types::JobType;

use common::{Harness, task};

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        description: String::new(),
        is_completed: false,
    }
}

#[tokio::test]
async fn created_task_is_invisible_until_its_event_is_applied() {
    let h = Harness::new();

    let created = h.commands.create_task(new_task("Buy milk")).await.unwrap();
    assert!(h.queries.get_task(&created.id).await.unwrap().is_none());

    let outcomes = h.deliver_all().await;
    assert_eq!(outcomes, vec![SyncOutcome::Applied]);

    let fetched = h
        .queries
        .get_task(&created.id)
        .await
        .unwrap()
        .expect("visible after sync");
    assert_eq!(fetched.title, "Buy milk");
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn each_mutation_publishes_one_event_of_its_kind() {
    let h = Harness::new();

    let created = h.commands.create_task(new_task("Write report")).await.unwrap();
    let patch = TaskPatch {
        is_completed: Some(true),
        ..Default::default()
    };
    let updated = h
        .commands
        .update_task(&created.id, patch)
        .await
        .unwrap()
        .expect("task exists");
    assert!(h.commands.delete_task(&created.id).await.unwrap());

    assert_eq!(
        h.jobs.job_types().await,
        vec![
            JobType::SyncTaskCreated,
            JobType::SyncTaskUpdated,
            JobType::SyncTaskDeleted
        ]
    );
    assert!(
        h.jobs
            .records()
            .await
            .iter()
            .all(|job| job.max_attempts == SYNC_JOB_MAX_ATTEMPTS)
    );

    let events = h.jobs.events().await;
    assert_eq!(events[0], ChangeEvent::Created { task: created.clone() });
    assert_eq!(events[1], ChangeEvent::Updated { task: updated.clone() });
    match &events[2] {
        ChangeEvent::Deleted { id, deleted_at } => {
            assert_eq!(id, &created.id);
            assert!(*deleted_at > updated.updated_at);
        }
        other => panic!("expected a delete event, got {other:?}"),
    }
    assert!(updated.updated_at > created.updated_at);
    assert!(updated.is_completed);
}

#[tokio::test]
async fn missing_ids_are_reported_without_publishing() {
    let h = Harness::new();

    let updated = h
        .commands
        .update_task("nope", TaskPatch::default())
        .await
        .unwrap();
    assert!(updated.is_none());
    assert!(!h.commands.delete_task("nope").await.unwrap());
    assert!(h.jobs.records().await.is_empty());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_store_access() {
    let h = Harness::new();
    h.write.set_unavailable(true);

    let err = h.commands.create_task(new_task("   ")).await.unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Domain(DomainError::Validation { .. })
    ));

    let patch = TaskPatch {
        title: Some("x".repeat(201)),
        ..Default::default()
    };
    let err = h.commands.update_task("any", patch).await.unwrap_err();
    assert!(matches!(
        err,
        TaskServiceError::Domain(DomainError::Validation { .. })
    ));
    assert!(h.jobs.records().await.is_empty());
}

#[tokio::test]
async fn write_store_outage_propagates_and_publishes_nothing() {
    let h = Harness::new();
    h.write.set_unavailable(true);

    let err = h.commands.create_task(new_task("Offline")).await.unwrap_err();
    match err {
        TaskServiceError::Repo(repo) => assert!(repo.is_unavailable()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.jobs.records().await.is_empty());
}

#[tokio::test]
async fn publish_failure_after_commit_still_succeeds_and_loses_the_event() {
    let h = Harness::new();
    h.jobs.set_unavailable(true);

    let created = h.commands.create_task(new_task("Lost")).await.unwrap();

    assert!(h.write.get(&created.id).await.is_some());
    assert!(h.jobs.records().await.is_empty());
    assert!(h.queries.get_task(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn applying_the_same_event_twice_is_idempotent() {
    let h = Harness::new();
    let snapshot = task("t1", "Same", datetime!(2024-05-01 09:30 UTC));
    let event = ChangeEvent::Created {
        task: snapshot.clone(),
    };

    assert_eq!(
        h.synchronizer.apply(&event).await.unwrap(),
        SyncOutcome::Applied
    );
    let first = h.read.get("t1").await;
    assert_eq!(
        h.synchronizer.apply(&event).await.unwrap(),
        SyncOutcome::Applied
    );

    assert_eq!(h.read.get("t1").await, first);
    assert_eq!(h.read.len().await, 1);
    assert_eq!(h.index().await, vec!["t1".to_string()]);
}

#[tokio::test]
async fn older_update_delivered_late_does_not_regress_the_read_model() {
    let h = Harness::new();
    let older = task("t1", "first draft", datetime!(2024-05-01 09:00 UTC));
    let newer = task("t1", "final", datetime!(2024-05-01 10:00 UTC));

    h.synchronizer
        .apply(&ChangeEvent::Updated { task: newer.clone() })
        .await
        .unwrap();
    let outcome = h
        .synchronizer
        .apply(&ChangeEvent::Updated { task: older })
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Stale);
    assert_eq!(h.read.get("t1").await, Some(newer.clone()));

    let listed = h.queries.list_tasks().await.unwrap();
    assert_eq!(listed, vec![newer]);
}

#[tokio::test]
async fn stale_event_leaves_the_cached_entry_alone() {
    let h = Harness::new();
    let newer = task("t1", "final", datetime!(2024-05-01 10:00 UTC));
    let older = task("t1", "draft", datetime!(2024-05-01 09:00 UTC));

    h.synchronizer
        .apply(&ChangeEvent::Updated { task: newer.clone() })
        .await
        .unwrap();
    h.synchronizer
        .apply(&ChangeEvent::Created { task: older })
        .await
        .unwrap();

    let cached = h.cache.bulk_get(&["t1".to_string()]).await.unwrap();
    assert_eq!(cached.hits, vec![newer]);
}

#[tokio::test]
async fn delete_removes_task_from_reads_and_list() {
    let h = Harness::new();
    let keep = h.commands.create_task(new_task("keep")).await.unwrap();
    let gone = h.commands.create_task(new_task("drop")).await.unwrap();
    h.deliver_all().await;
    assert_eq!(h.queries.list_tasks().await.unwrap().len(), 2);

    assert!(h.commands.delete_task(&gone.id).await.unwrap());
    assert_eq!(h.deliver_all().await, vec![SyncOutcome::Removed]);

    assert!(h.queries.get_task(&gone.id).await.unwrap().is_none());
    let listed = h.queries.list_tasks().await.unwrap();
    assert_eq!(listed, vec![keep.clone()]);
    assert_eq!(h.index().await, vec![keep.id]);
}

#[tokio::test]
async fn redelivered_delete_is_harmless() {
    let h = Harness::new();
    let event = ChangeEvent::Deleted {
        id: "gone".to_string(),
        deleted_at: datetime!(2024-05-01 10:00 UTC),
    };

    assert_eq!(
        h.synchronizer.apply(&event).await.unwrap(),
        SyncOutcome::AlreadyAbsent
    );
    assert_eq!(
        h.synchronizer.apply(&event).await.unwrap(),
        SyncOutcome::AlreadyAbsent
    );
}

#[tokio::test]
async fn delete_delivered_before_create_keeps_the_task_gone() {
    let h = Harness::new();
    let created = h.commands.create_task(new_task("Buy milk")).await.unwrap();
    assert!(h.commands.delete_task(&created.id).await.unwrap());

    let mut events = h.jobs.take_events().await;
    events.reverse();
    let mut outcomes = Vec::new();
    for event in &events {
        outcomes.push(h.synchronizer.apply(event).await.unwrap());
    }

    assert_eq!(
        outcomes,
        vec![SyncOutcome::AlreadyAbsent, SyncOutcome::Stale]
    );
    assert!(h.write.get(&created.id).await.is_none());
    assert!(h.read.get(&created.id).await.is_none());
    assert!(h.read.tombstone(&created.id).await.is_some());
    assert!(h.queries.get_task(&created.id).await.unwrap().is_none());
    assert!(h.queries.list_tasks().await.unwrap().is_empty());
    assert!(h.index().await.is_empty());
}

#[tokio::test]
async fn late_update_after_delete_is_rejected() {
    let h = Harness::new();
    let created = h.commands.create_task(new_task("draft")).await.unwrap();
    let patch = TaskPatch {
        title: Some("final".to_string()),
        ..Default::default()
    };
    h.commands
        .update_task(&created.id, patch)
        .await
        .unwrap()
        .expect("task exists");
    assert!(h.commands.delete_task(&created.id).await.unwrap());

    // created, deleted, then the update arrives last
    let events = h.jobs.take_events().await;
    for index in [0, 2, 1] {
        h.synchronizer.apply(&events[index]).await.unwrap();
    }

    assert!(h.read.get(&created.id).await.is_none());
    assert!(h.queries.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn read_store_failure_fails_the_event_without_touching_the_cache() {
    let h = Harness::new();
    h.read.set_unavailable(true);

    let event = ChangeEvent::Created {
        task: task("t1", "x", datetime!(2024-05-01 09:00 UTC)),
    };
    assert!(h.synchronizer.apply(&event).await.is_err());

    assert!(h.index().await.is_empty());
    assert_eq!(h.cache.live_entries(), 0);
}

#[tokio::test]
async fn dangling_index_member_is_healed_by_the_next_list() {
    let h = Harness::new();
    for (id, hour) in [("a", 9), ("b", 10)] {
        let snapshot = task(
            id,
            id,
            datetime!(2024-05-01 00:00 UTC) + time::Duration::hours(hour),
        );
        h.synchronizer
            .apply(&ChangeEvent::Created { task: snapshot })
            .await
            .unwrap();
    }

    // "b" disappears out of band: entry gone, row gone, index member left behind.
    h.cache.delete("b").await.unwrap();
    h.read.remove_raw("b").await;

    let listed = h.queries.list_tasks().await.unwrap();
    assert_eq!(
        listed.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        ["a"]
    );
    assert_eq!(h.index().await, vec!["a".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn one_expired_entry_costs_exactly_one_lookup() {
    let h = Harness::new();
    let a = task("a", "first", datetime!(2024-05-01 09:00 UTC));
    let b = task("b", "second", datetime!(2024-05-01 10:00 UTC));

    h.synchronizer
        .apply(&ChangeEvent::Created { task: a.clone() })
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(40)).await;
    h.synchronizer
        .apply(&ChangeEvent::Created { task: b.clone() })
        .await
        .unwrap();

    let before = h.queries.list_tasks().await.unwrap();
    assert_eq!(before, vec![a.clone(), b.clone()]);

    // "a" was written 70s ago and has expired; "b" is still live.
    tokio::time::advance(Duration::from_secs(30)).await;
    h.read.reset_counters();

    let after = h.queries.list_tasks().await.unwrap();
    assert_eq!(after, before);
    assert_eq!(h.read.ids_fetched(), 1);
    assert_eq!(h.read.scans(), 0);
}

#[tokio::test]
async fn empty_index_triggers_full_rebuild() {
    let h = Harness::new();
    for n in 0..5 {
        let snapshot = task(
            &format!("t{n}"),
            "seeded",
            datetime!(2024-05-01 09:00 UTC) + time::Duration::minutes(n),
        );
        h.read.insert_raw(snapshot).await;
    }

    let listed = h.queries.list_tasks().await.unwrap();

    assert_eq!(listed.len(), 5);
    assert_eq!(h.read.scans(), 1);
    assert_eq!(h.index().await, vec!["t0", "t1", "t2", "t3", "t4"]);
    assert_eq!(h.cache.live_entries(), 5);

    h.read.reset_counters();
    assert_eq!(h.queries.list_tasks().await.unwrap(), listed);
    assert_eq!(h.read.scans(), 0);
    assert_eq!(h.read.ids_fetched(), 0);
}

#[tokio::test]
async fn index_pointing_only_at_missing_rows_falls_back_to_rebuild() {
    let h = Harness::new();
    h.cache
        .index_replace(&["ghost".to_string()])
        .await
        .unwrap();
    h.read
        .insert_raw(task("real", "real", datetime!(2024-05-01 09:00 UTC)))
        .await;

    let listed = h.queries.list_tasks().await.unwrap();

    assert_eq!(
        listed.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
        ["real"]
    );
    assert_eq!(h.index().await, vec!["real".to_string()]);
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let h = Harness::new();
    assert!(h.queries.list_tasks().await.unwrap().is_empty());
    assert!(h.index().await.is_empty());
}

#[tokio::test]
async fn get_task_warms_the_cache() {
    let h = Harness::new();
    let snapshot = task("t1", "warm", datetime!(2024-05-01 09:00 UTC));
    h.read.insert_raw(snapshot.clone()).await;

    assert_eq!(h.queries.get_task("t1").await.unwrap(), Some(snapshot));
    assert_eq!(h.cache.live_entries(), 1);
    assert_eq!(h.index().await, vec!["t1".to_string()]);
}

#[tokio::test]
async fn unreachable_cache_falls_back_to_the_read_store() {
    let h = Harness::with_broken_cache();
    let created = h.commands.create_task(new_task("resilient")).await.unwrap();
    h.deliver_all().await;

    let listed = h.queries.list_tasks().await.unwrap();
    assert_eq!(listed, vec![created.clone()]);
    assert_eq!(h.read.scans(), 1);
    assert_eq!(h.queries.get_task(&created.id).await.unwrap(), Some(created));
}

#[tokio::test]
async fn read_store_outage_surfaces_on_queries() {
    let h = Harness::new();
    h.read.set_unavailable(true);

    match h.queries.list_tasks().await.unwrap_err() {
        TaskServiceError::Repo(err) => assert!(err.is_unavailable()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn read_store_lookups_ignore_unknown_ids() {
    let h = Harness::new();
    h.read
        .insert_raw(task("t1", "one", datetime!(2024-05-01 09:00 UTC)))
        .await;

    let found = h
        .read
        .find_tasks(&["t1".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}
