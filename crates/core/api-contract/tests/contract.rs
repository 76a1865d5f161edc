use api_contract::{
    CommandRequest, InstrumentStatusDto, MetricsSnapshotDto, OutputStatusDto,
    SessionActionResponse,
};
use serde_json::Value;

#[test]
fn instrument_status_is_camel_case() {
    let dto = InstrumentStatusDto {
        instrument_id: "geiger-1".to_string(),
        name: "Lab counter".to_string(),
        instrument_type: "usb_geiger".to_string(),
        state: "open".to_string(),
        streaming: true,
        outputs: vec![OutputStatusDto {
            output_id: "out-1".to_string(),
            output_type: "mqtt".to_string(),
            last_send_at_ms: 1_700_000_000_000,
            last_alarm_at_ms: None,
            alarm_interval_ms: 60_000,
            regular_interval_ms: 0,
        }],
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["instrumentId"], "geiger-1");
    assert_eq!(value["instrumentType"], "usb_geiger");
    assert!(value.get("instrument_id").is_none());

    let output = &value["outputs"][0];
    assert_eq!(output["outputId"], "out-1");
    assert_eq!(output["lastSendAtMs"], 1_700_000_000_000_i64);
    assert_eq!(output["lastAlarmAtMs"], Value::Null);
    assert_eq!(output["alarmIntervalMs"], 60_000);
}

#[test]
fn command_request_accepts_both_keys() {
    let req: CommandRequest = serde_json::from_str(r#"{"command":"TAG"}"#).expect("parse");
    assert_eq!(req.command, "TAG");
    let req: CommandRequest = serde_json::from_str(r#"{"cmd":"<GETVER>"}"#).expect("parse");
    assert_eq!(req.command, "<GETVER>");
    assert!(serde_json::from_str::<CommandRequest>("{}").is_err());
}

#[test]
fn session_action_response_is_camel_case() {
    let response = SessionActionResponse {
        instrument_id: "geiger-1".to_string(),
        state: "open".to_string(),
        bound_outputs: 2,
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["boundOutputs"], 2);
    assert!(value.get("bound_outputs").is_none());
}

#[test]
fn metrics_snapshot_is_camel_case() {
    let dto = MetricsSnapshotDto {
        lines_received: 3,
        frames_decoded: 2,
        frames_unrecognized: 1,
        frames_dropped: 0,
        outputs_triggered: 1,
        alarms_fired: 1,
        send_success: 1,
        send_failure: 0,
        send_stale: 0,
        send_latency_ms_total: 12,
        send_latency_ms_count: 1,
        dispatch_without_outputs: 0,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert_eq!(value["framesDecoded"], 2);
    assert_eq!(value["sendLatencyMsTotal"], 12);
    assert!(value.get("frames_decoded").is_none());
}
