use relay_telemetry::{metrics, new_request_ids, record_frame_decoded};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_are_monotonic() {
    let before = metrics().snapshot().frames_decoded;
    record_frame_decoded();
    record_frame_decoded();
    assert!(metrics().snapshot().frames_decoded >= before + 2);
}
