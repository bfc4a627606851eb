use httpexpect::{MockServer, Regex};
use reqwest::blocking::Client;

#[test]
fn path_regex_filter_normalizes_incoming_urls_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::start();
    server
        .filtering_path_regex(Regex::new("password=[^&]*").unwrap(), "password=XXX")
        .get("/url?password=XXX")
        .reply(200, "filtered");

    // Act
    let response = reqwest::blocking::get(server.url("/url?password=artischocko")).unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().unwrap(), "filtered");
    server.done();
}

#[test]
fn path_function_filter_normalizes_incoming_urls_test() {
    // Arrange
    let server = MockServer::start();
    server
        .filtering_path(|path| path.split('?').next().unwrap_or_default().to_string())
        .get("/items")
        .reply(200, "");

    // Act
    let response = reqwest::blocking::get(server.url("/items?ts=1712345678")).unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    server.done();
}

#[test]
fn path_filter_does_not_touch_registered_urls_test() {
    // Arrange
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server
        .filtering_path(|path| path.to_uppercase())
        .get("/lower")
        .reply(200, "");

    // Act
    let response = reqwest::blocking::get(server.url("/lower")).unwrap();

    // Assert
    assert_eq!(response.status(), 404);
    assert!(!server.has_route(httpexpect::Method::GET, "/LOWER"));
}

#[test]
fn body_regex_filter_rewrites_expectations_registered_afterwards_test() {
    // Arrange
    let server = MockServer::start();
    server
        .filtering_request_body_regex(Regex::new(r#""ts":\d+"#).unwrap(), r#""ts":0"#)
        .post("/events", r#"{"name":"login","ts":1712345678}"#)
        .reply(202, "");

    // Act
    let response = Client::new()
        .post(server.url("/events"))
        .body(r#"{"name":"login","ts":0}"#)
        .send()
        .unwrap();

    // Assert
    assert_eq!(response.status(), 202);
    assert_eq!(server.expectations().len(), 0);
    server.done();
}

#[test]
fn cleared_body_filter_no_longer_applies_test() {
    // Arrange
    let server = MockServer::start();
    server
        .filtering_request_body(|body| body.replace("secret", "XXX"))
        .post("/a", "secret")
        .reply(200, "")
        .clear_body_filter()
        .post("/b", "secret")
        .reply(200, "");

    // Assert
    let bodies: Vec<String> = server
        .expectations()
        .into_iter()
        .map(|e| e.body)
        .collect();
    assert_eq!(bodies, vec!["XXX".to_string(), "secret".to_string()]);
}
