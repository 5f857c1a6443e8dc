use reactor::http::response::{Response, ResponseBuilder, StatusCode};
use reactor::http::writer::serialize_response;

#[test]
fn test_status_codes() {
    let table = [
        (StatusCode::Ok, 200, "OK"),
        (StatusCode::NoContent, 204, "No Content"),
        (StatusCode::NotFound, 404, "Not Found"),
        (StatusCode::RequestTimeout, 408, "Request Timeout"),
        (StatusCode::InternalServerError, 500, "Internal Server Error"),
    ];

    for (status, code, phrase) in table {
        assert_eq!(status.as_u16(), code);
        assert_eq!(status.reason_phrase(), phrase);
    }
}

#[test]
fn test_response_builder_auto_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body(b"This is the body".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), "16");
    assert_eq!(response.headers.len(), 2);
}

#[test]
fn test_response_builder_preserves_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Length").unwrap(), "999");
}

#[test]
fn test_response_keep_alive_defaults_to_true() {
    assert!(Response::ok("x").keep_alive());
}

#[test]
fn test_response_keep_alive_from_builder() {
    let closing = ResponseBuilder::new(StatusCode::Ok).keep_alive(false).build();
    let kept = ResponseBuilder::new(StatusCode::Ok).keep_alive(true).build();

    assert!(!closing.keep_alive());
    assert!(kept.keep_alive());
}

#[test]
fn test_response_with_keep_alive_replaces_any_casing() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("connection", "keep-alive")
        .build()
        .with_keep_alive(false);

    assert_eq!(response.header("Connection"), Some("close"));
    assert_eq!(
        response.headers.keys().filter(|k| k.eq_ignore_ascii_case("connection")).count(),
        1
    );
    assert!(!response.keep_alive());
}

#[test]
fn test_response_helpers() {
    assert_eq!(Response::ok("hi").body, b"hi".to_vec());
    assert_eq!(Response::not_found().status, StatusCode::NotFound);
    assert_eq!(Response::internal_error().status, StatusCode::InternalServerError);
}

#[test]
fn test_serialized_response_round_trips_headers() {
    let response = ResponseBuilder::new(StatusCode::Created)
        .header("X-Custom", "value")
        .body(b"made".to_vec())
        .build();

    let text = String::from_utf8(serialize_response(&response)).unwrap();

    assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(text.contains("X-Custom: value\r\n"));
    assert!(text.contains("Content-Length: 4\r\n"));
    assert!(text.ends_with("\r\n\r\nmade"));
}
