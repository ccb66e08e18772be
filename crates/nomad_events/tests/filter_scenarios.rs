use nomad_events::{
    Criticality, EventFilter, EventRelay, EventTypeList, FilterConfig, Liveness, RecordOutcome,
    TaskIdentifier, UnixNanos,
};
use proptest::prelude::*;
use serde_json::{json, Value};

const STARTED_AT: UnixNanos = UnixNanos(1_700_000_000_000_000_000);
const T1: i64 = 1_700_000_010_000_000_000;
const T2: i64 = 1_700_000_020_000_000_000;

fn task_event(kind: &str, time: i64, details: Value) -> Value {
    json!({
        "Type": kind,
        "Time": time,
        "DisplayMessage": format!("{kind} event"),
        "Details": details,
    })
}

fn allocation_record(index: u64, namespace: &str, tasks: Value) -> Value {
    json!({
        "Index": index,
        "Events": [{
            "Topic": "Allocation",
            "Type": "AllocationUpdated",
            "Payload": {"Allocation": {
                "Namespace": namespace,
                "JobID": "billing",
                "NodeName": "worker-3",
                "TaskStates": tasks,
            }},
        }],
    })
}

fn filter_with(config: FilterConfig) -> EventFilter {
    EventFilter::new(config, 100, STARTED_AT)
}

fn task() -> TaskIdentifier {
    TaskIdentifier::new(Some("default"), "billing", "api")
}

#[test]
fn two_unseen_events_are_both_emitted() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        101,
        "default",
        json!({"api": {"Events": [
            task_event("Received", T1, json!({})),
            task_event("Started", T2, json!({})),
        ]}}),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    let types: Vec<_> = notes.iter().map(|n| n.event_type.as_str()).collect();
    assert_eq!(types, vec!["Received", "Started"]);
    assert_eq!(filter.watermarks().get(&task()), Some(UnixNanos(T2)));
}

#[test]
fn denylisted_event_still_advances_the_watermark() {
    let mut filter = filter_with(FilterConfig {
        denylist: EventTypeList::parse("Received"),
        ..FilterConfig::default()
    });
    let record = allocation_record(
        101,
        "default",
        json!({"api": {"Events": [
            task_event("Received", T1, json!({})),
            task_event("Started", T2, json!({})),
        ]}}),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].event_type, "Started");
    assert_eq!(filter.watermarks().get(&task()), Some(UnixNanos(T2)));
}

#[test]
fn watermark_moves_even_when_every_event_is_filtered_out() {
    let mut filter = filter_with(FilterConfig {
        allowlist: EventTypeList::parse("Terminated"),
        ..FilterConfig::default()
    });
    let events = json!({"api": {"Events": [task_event("Started", T1, json!({}))]}});

    assert!(filter
        .process(&allocation_record(101, "default", events.clone()))
        .unwrap()
        .into_notifications()
        .is_empty());
    assert_eq!(filter.watermarks().get(&task()), Some(UnixNanos(T1)));
}

#[test]
fn event_in_both_lists_is_never_emitted() {
    let mut filter = filter_with(FilterConfig {
        allowlist: EventTypeList::parse("Terminated,Restarting"),
        denylist: EventTypeList::parse("Terminated"),
    });
    let record = allocation_record(
        101,
        "default",
        json!({"api": {"Events": [
            task_event("Terminated", T1, json!({"exit_code": "1"})),
            task_event("Restarting", T2, json!({})),
        ]}}),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].event_type, "Restarting");
}

#[test]
fn events_before_process_start_are_not_notified() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        101,
        "default",
        json!({"api": {"Events": [task_event("Started", STARTED_AT.as_i64(), json!({}))]}}),
    );
    assert!(filter.process(&record).unwrap().into_notifications().is_empty());
    assert_eq!(filter.watermarks().get(&task()), Some(STARTED_AT));
}

#[test]
fn replayed_allocation_state_is_deduplicated() {
    let mut filter = filter_with(FilterConfig::default());
    let first = json!({"api": {"Events": [task_event("Started", T1, json!({}))]}});
    let second = json!({"api": {"Events": [
        task_event("Started", T1, json!({})),
        task_event("Terminated", T2, json!({"exit_code": "0"})),
    ]}});

    assert_eq!(
        filter
            .process(&allocation_record(101, "default", first))
            .unwrap()
            .into_notifications()
            .len(),
        1
    );
    let notes = filter
        .process(&allocation_record(102, "default", second))
        .unwrap()
        .into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].event_type, "Terminated");
    assert_eq!(notes[0].criticality, Criticality::Success);
}

#[test]
fn terminated_exit_codes_are_classified() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        101,
        "default",
        json!({
            "api": {"Events": [task_event("Terminated", T1, json!({"exit_code": "1"}))]},
            "worker": {"Events": [task_event("Terminated", T1, json!({"exit_code": "0"}))]},
        }),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    let by_task: Vec<_> = notes
        .iter()
        .map(|n| (n.task.as_str(), n.criticality))
        .collect();
    assert_eq!(
        by_task,
        vec![
            ("billing.api", Criticality::Failure),
            ("billing.worker", Criticality::Success),
        ]
    );
}

#[test]
fn connect_proxy_tasks_never_surface() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        101,
        "payments",
        json!({
            "connect-proxy-api": {"Events": [task_event("Started", T1, json!({}))]},
            "api": {"Events": [task_event("Started", T1, json!({}))]},
        }),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].task.as_str(), "payments/billing.api");
    assert_eq!(notes[0].namespace.as_deref(), Some("payments"));
    assert_eq!(filter.watermarks().len(), 1);
    assert!(filter
        .watermarks()
        .iter()
        .all(|(task, _)| !task.as_str().contains("connect-proxy")));
}

#[test]
fn malformed_sibling_does_not_abort_processing() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        101,
        "default",
        json!({
            "api": {"Events": [
                {"Type": "Broken", "Details": {}},
                {"Type": "Started", "Time": T1},
            ]},
            "cron": {"Events": "x"},
            "sidecar": {"Events": null},
            "worker": null,
        }),
    );

    let notes = filter.process(&record).unwrap().into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].task.as_str(), "billing.api");
    assert!(notes[0].details.is_empty());
    assert_eq!(notes[0].display_message, "");
    assert_eq!(filter.watermarks().get(&task()), Some(UnixNanos(T1)));
    assert!(filter
        .watermarks()
        .get(&TaskIdentifier::new(None, "billing", "worker"))
        .is_none());
}

#[test]
fn null_allocation_fields_do_not_hide_healthy_tasks() {
    let mut filter = filter_with(FilterConfig::default());
    let record = json!({
        "Index": 101,
        "Events": [{
            "Topic": "Allocation",
            "Payload": {"Allocation": {
                "Namespace": null,
                "JobID": "billing",
                "NodeName": null,
                "TaskStates": {"api": {"Events": [
                    {"Type": "Started", "Time": T1, "DisplayMessage": 5, "Details": "oops"},
                ]}},
            }},
        }],
    });

    let notes = filter.process(&record).unwrap().into_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].task.as_str(), "billing.api");
    assert_eq!(notes[0].node_name, "");
    assert_eq!(notes[0].display_message, "");
    assert!(notes[0].details.is_empty());
}

#[test]
fn heartbeat_line_updates_liveness_without_notifications() {
    let liveness = Liveness::new(UnixNanos(0));
    let mut relay = EventRelay::new(filter_with(FilterConfig::default()).with_liveness(liveness.clone()));
    assert!(relay.feed("{}\n").unwrap().is_empty());
    assert!(liveness.last_seen() > UnixNanos(0));
    assert_eq!(relay.summary().heartbeats, 1);
}

#[test]
fn replay_below_starting_index_is_ignored() {
    let mut filter = filter_with(FilterConfig::default());
    let record = allocation_record(
        100,
        "default",
        json!({"api": {"Events": [task_event("Started", T2, json!({}))]}}),
    );
    assert_eq!(filter.process(&record).unwrap(), RecordOutcome::Replay { index: 100 });
    assert!(filter.watermarks().is_empty());
}

#[test]
fn blocking_reader_drives_the_relay_to_completion() {
    let record = allocation_record(
        101,
        "default",
        json!({"api": {"Events": [task_event("Started", T1, json!({}))]}}),
    );
    let stream = format!("{{}}\n{record}\n{{}}\n");

    let mut relay = EventRelay::new(filter_with(FilterConfig::default()));
    let mut seen = Vec::new();
    let summary = relay
        .run(std::io::Cursor::new(stream.into_bytes()), |note| seen.push(note))
        .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].task, task());
    assert_eq!(summary.heartbeats, 2);
    assert_eq!(summary.notifications, 1);
    assert_eq!(summary.dangling_bytes, 0);
}

proptest! {
    #[test]
    fn watermark_never_decreases_and_stale_events_never_emit(
        batches in prop::collection::vec(prop::collection::vec(0i64..1_000, 0..6), 1..12),
    ) {
        let start = UnixNanos(200);
        let mut filter = EventFilter::new(FilterConfig::default(), 0, start);
        let task = TaskIdentifier::new(None, "billing", "api");
        let mut previous = start;

        for (i, times) in batches.iter().enumerate() {
            let events: Vec<Value> = times
                .iter()
                .map(|time| task_event("Started", *time, json!({})))
                .collect();
            let record = allocation_record(i as u64 + 1, "default", json!({"api": {"Events": events}}));

            let notes = filter.process(&record).unwrap().into_notifications();
            for note in &notes {
                prop_assert!(note.time > previous);
            }

            let current = filter.watermarks().get(&task).unwrap();
            prop_assert!(current >= previous);
            let batch_max = times.iter().copied().max().map(UnixNanos);
            prop_assert_eq!(current, batch_max.map_or(previous, |max| max.max(previous)));
            previous = current;
        }
    }
}
