use httpexpect::{Error, Method, MockServer};

#[test]
fn done_succeeds_once_all_expectations_are_processed_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::start();
    server.get("/a").reply(200, "").get("/b").reply(200, "");

    // Act
    reqwest::blocking::get(server.url("/a")).unwrap();
    reqwest::blocking::get(server.url("/b")).unwrap();

    // Assert
    server.done();
}

#[test]
#[should_panic(expected = "Unprocessed Requests in Assertions Queue")]
fn done_panics_with_pending_expectations_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/never/called").reply(200, "");

    // Assert
    server.done();
}

#[test]
fn done_with_reports_pending_routes_test() {
    // Arrange
    let server = MockServer::start();
    server
        .get("/called")
        .reply(200, "")
        .post("/pending", "x")
        .reply(200, "")
        .delete("/also/pending")
        .twice()
        .reply(200, "");

    reqwest::blocking::get(server.url("/called")).unwrap();

    // Act
    let result = server.done_with(|result| result);

    // Assert
    assert_eq!(
        result,
        Err(Error::UnprocessedExpectations(vec![
            "POST /pending".to_string(),
            "DELETE /also/pending".to_string(),
        ]))
    );

    let message = result.unwrap_err().to_string();
    assert!(message.starts_with("Unprocessed Requests in Assertions Queue: \n"));
    assert!(message.contains(r#""POST /pending""#));
}

#[test]
fn done_ignores_pending_expectations_when_disabled_test() {
    // Arrange
    let server = MockServer::builder()
        .throw_on_unprocessed_requests(false)
        .start();
    server.get("/never/called").reply(200, "");

    // Assert
    server.done();
    assert_eq!(server.expectations().len(), 1);
}

#[test]
fn has_route_reflects_the_live_queue_test() {
    // Arrange
    let server = MockServer::start();
    server
        .get("/users")
        .reply(200, "")
        .post("/users", r#"{"name":"Fred"}"#)
        .header("Content-Type", "application/json")
        .reply(201, "");

    // Assert
    assert!(server.has_route(Method::GET, "/users"));
    assert!(!server.has_route(Method::GET, "/unknown"));
    assert!(!server.has_route(Method::POST, "/users"));
    assert!(server.has_route_with(
        Method::POST,
        "/users",
        r#"{ "name": "Fred" }"#,
        &[("content-type", "application/json")],
    ));

    // Act
    reqwest::blocking::get(server.url("/users")).unwrap();

    // Assert
    assert!(!server.has_route(Method::GET, "/users"));
}

#[test]
fn unsatisfied_expectations_lists_what_is_missing_test() {
    // Arrange
    let server = MockServer::start();
    server
        .get("/optional")
        .any()
        .reply(200, "")
        .get("/required")
        .min(2)
        .reply(200, "");

    // Act
    reqwest::blocking::get(server.url("/required")).unwrap();
    let unsatisfied = server.unsatisfied_expectations();

    // Assert
    assert_eq!(unsatisfied.len(), 1);
    assert_eq!(unsatisfied[0].route(), "GET /required");
    assert_eq!(unsatisfied[0].stats.count, 1);
    assert_eq!(unsatisfied[0].stats.min, 2);
}

#[test]
fn reset_clears_expectations_and_filters_test() {
    // Arrange
    let server = MockServer::start();
    server
        .filtering_path(|_| "/filtered".to_string())
        .get("/filtered")
        .reply(200, "")
        .get("/other")
        .reply(200, "");

    // Act
    server.reset();
    server.get("/plain").reply(200, "plain");
    let response = reqwest::blocking::get(server.url("/plain")).unwrap();

    // Assert
    assert_eq!(response.text().unwrap(), "plain");
    server.done();
}
