use httpexpect::MockServer;
use reqwest::{blocking::Client, header::HeaderValue};

#[test]
fn request_headers_must_be_present_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server
        .get("/secure")
        .header("Authorization", "Bearer token")
        .reply(200, "welcome");

    // Act
    let without = Client::new().get(server.url("/secure")).send().unwrap();
    let with = Client::new()
        .get(server.url("/secure"))
        .header("authorization", "Bearer token")
        .header("x-extra", "ignored")
        .send()
        .unwrap();

    // Assert
    assert_eq!(without.status(), 404);
    assert_eq!(with.status(), 200);
    assert_eq!(with.text().unwrap(), "welcome");
    server.done();
}

#[test]
fn empty_expected_header_value_is_not_enforced_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/lenient").header("x-optional", "").reply(200, "");

    // Act
    let response = Client::new().get(server.url("/lenient")).send().unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    server.done();
}

#[test]
fn reply_headers_are_sent_test() {
    // Arrange
    let server = MockServer::start();
    server
        .get("/headers")
        .reply_with_headers(200, "{}", vec![("Content-Type", "application/json"), ("X-Version", "1")]);

    // Act
    let response = reqwest::blocking::get(server.url("/headers")).unwrap();

    // Assert
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["x-version"], "1");
    server.done();
}

#[test]
fn default_reply_headers_apply_to_replies_without_headers_test() {
    // Arrange
    let server = MockServer::builder()
        .default_reply_headers(vec![("X-Powered-By", "httpexpect")])
        .start();
    server
        .get("/default")
        .reply(200, "")
        .get("/explicit")
        .reply_headers(vec![("X-Custom", "yes")])
        .reply(200, "");

    // Act
    let default = reqwest::blocking::get(server.url("/default")).unwrap();
    let explicit = reqwest::blocking::get(server.url("/explicit")).unwrap();

    // Assert
    assert_eq!(default.headers()["x-powered-by"], "httpexpect");
    assert_eq!(explicit.headers()["x-custom"], "yes");
    assert!(explicit.headers().get("x-powered-by").is_none());
    server.done();
}

#[test]
fn non_utf8_header_values_do_not_prevent_matching_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/binary-header").any().reply(200, "ok");

    // Act
    let response = Client::new()
        .get(server.url("/binary-header"))
        .header("x-bin", HeaderValue::from_bytes(b"\xff\xfe").unwrap())
        .send()
        .unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().unwrap(), "ok");
    assert!(server.verify().is_ok());
}
