use api_contract::ApiResponse;

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());
    assert!(response.error.is_none());
}

#[test]
fn api_response_error() {
    let response = ApiResponse::<()>::error("RESOURCE.NOT_FOUND", "not found");
    assert!(!response.success);
    assert!(response.data.is_none());
    let error = response.error.expect("error body");
    assert_eq!(error.code, "RESOURCE.NOT_FOUND");
    assert_eq!(error.message, "not found");
}

#[test]
fn api_response_error_serializes_null_data() {
    let value = serde_json::to_value(ApiResponse::<()>::error("INVALID.REQUEST", "bad"))
        .expect("serialize");
    assert_eq!(value["success"], false);
    assert!(value["data"].is_null());
    assert_eq!(value["error"]["code"], "INVALID.REQUEST");
}
