/// Record store tests
///
/// Saving measurements, reading the history back and rendering it.
/// Run with: cargo test --test recorder_tests

mod common;

use bp_recorder::facade::MAX_NAME_SUFFIX;
use bp_recorder::{Record, RecorderError, RemoteStore, render_history};
use chrono::{Duration, TimeZone, Utc};
use common::memory_recorder;

const CONTAINER_PATH: &str = "/Root/Content/Apps/BPR-V0_1";

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 7, 30, 0).unwrap()
}

#[tokio::test]
async fn test_history_before_any_save() {
    let (store, recorder) = memory_recorder();

    let history = recorder.load_history().await.unwrap();
    assert!(history.is_empty());
    assert!(store.load_by_path(CONTAINER_PATH).await.unwrap().is_some());
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let (store, recorder) = memory_recorder();
    let record = Record::new(base_time(), 135, 85, 72);

    let path = recorder.save_record(&record).await.unwrap();
    assert_eq!(path, format!("{CONTAINER_PATH}/2024-03-15 07:30:00"));

    let object = store.load_by_path(&path).await.unwrap().unwrap();
    assert_eq!(object.type_name, "BloodPressure");
    assert_eq!(object.str_field("Recorded"), Some("2024-03-15T07:30:00Z"));
    assert_eq!(object.i64_field("Syst"), Some(135));

    let history = recorder.load_history().await.unwrap();
    assert_eq!(history, vec![record]);
}

#[tokio::test]
async fn test_round_trip_at_integer_edges() {
    let (_store, recorder) = memory_recorder();
    let edges = [0, -1, i32::MAX, i32::MIN];

    let mut saved = Vec::new();
    for (i, value) in edges.into_iter().enumerate() {
        let at = base_time() + Duration::seconds(i as i64);
        saved.push(Record::new(at, value, 80, 60));
        saved.push(Record::new(at + Duration::minutes(1), 120, value, 60));
        saved.push(Record::new(at + Duration::minutes(2), 120, 80, value));
    }
    for record in &saved {
        recorder.save_record(record).await.unwrap();
    }

    let history = recorder.load_history().await.unwrap();
    assert_eq!(history.len(), saved.len());
    for record in &saved {
        assert_eq!(
            history.iter().filter(|r| *r == record).count(),
            1,
            "{record:?} did not round-trip"
        );
    }
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let (_store, recorder) = memory_recorder();

    for minutes in [5, 0, 42, 17] {
        let record = Record::new(base_time() + Duration::minutes(minutes), 120, 80, 60);
        recorder.save_record(&record).await.unwrap();
    }

    let history = recorder.load_history().await.unwrap();
    assert_eq!(history.len(), 4);
    assert!(
        history
            .windows(2)
            .all(|pair| pair[0].recorded_at > pair[1].recorded_at)
    );
    assert_eq!(history[0].recorded_at, base_time() + Duration::minutes(42));
}

#[tokio::test]
async fn test_same_second_records_get_suffix() {
    let (_store, recorder) = memory_recorder();
    let first = Record::new(base_time(), 120, 80, 60);
    let second = Record::new(base_time(), 125, 82, 64);

    let first_path = recorder.save_record(&first).await.unwrap();
    let second_path = recorder.save_record(&second).await.unwrap();
    assert_eq!(first_path, format!("{CONTAINER_PATH}/2024-03-15 07:30:00"));
    assert_eq!(second_path, format!("{CONTAINER_PATH}/2024-03-15 07:30:00 (2)"));

    // Ties keep the order the store returned them in.
    let history = recorder.load_history().await.unwrap();
    assert_eq!(history, vec![first, second]);
}

#[tokio::test]
async fn test_suffixes_run_out() {
    let (_store, recorder) = memory_recorder();
    let record = Record::new(base_time(), 120, 80, 60);

    for _ in 0..MAX_NAME_SUFFIX {
        recorder.save_record(&record).await.unwrap();
    }
    let err = recorder.save_record(&record).await.unwrap_err();
    assert!(matches!(err, RecorderError::AlreadyExists { .. }), "{err}");
    assert_eq!(
        recorder.load_history().await.unwrap().len(),
        MAX_NAME_SUFFIX as usize
    );
}

#[tokio::test]
async fn test_text_input_defaults_to_zero() {
    let (_store, recorder) = memory_recorder();
    let record = Record::from_input(base_time(), " 118 ", "", "n/a");
    assert_eq!((record.systolic, record.diastolic, record.pulse), (118, 0, 0));

    recorder.save_record(&record).await.unwrap();
    let history = recorder.load_history().await.unwrap();
    assert_eq!(history[0].diastolic, 0);
}

#[tokio::test]
async fn test_malformed_record_fails_history() {
    let (store, recorder) = memory_recorder();
    let container = recorder.ensure_container().await.unwrap();

    let broken = store.create_child(&container.path, "BloodPressure", "broken");
    store.save(&broken).await.unwrap();

    let err = recorder.load_history().await.unwrap_err();
    assert!(matches!(err, RecorderError::MalformedResult(_)), "{err}");
}

#[tokio::test]
async fn test_rendered_history() {
    let (_store, recorder) = memory_recorder();
    recorder
        .save_record(&Record::new(base_time(), 120, 80, 60))
        .await
        .unwrap();
    recorder
        .save_record(&Record::new(base_time() + Duration::hours(1), 131, 88, 75))
        .await
        .unwrap();

    let rendered = render_history(&recorder.load_history().await.unwrap());
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[2], "2024-03-15 08:30:00  131/88    75");
    assert_eq!(lines[3], "2024-03-15 07:30:00  120/80    60");
}
