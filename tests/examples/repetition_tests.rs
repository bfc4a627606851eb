use httpexpect::{Error, MockServer};

fn get_status(server: &MockServer, path: &str) -> u16 {
    reqwest::blocking::get(server.url(path))
        .unwrap()
        .status()
        .as_u16()
}

#[test]
fn once_is_consumed_after_one_match_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server.get("/once").once().reply(200, "");

    // Act
    let first = get_status(&server, "/once");
    let second = get_status(&server, "/once");

    // Assert
    assert_eq!(first, 200);
    assert_eq!(second, 404);
    server.done();
}

#[test]
fn twice_is_satisfied_after_one_match_and_exhausted_after_two_test() {
    // Arrange
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server.get("/twice").twice().reply(200, "");

    // Act & Assert
    assert_eq!(get_status(&server, "/twice"), 200);
    assert!(server.unsatisfied_expectations().is_empty());
    assert_eq!(server.expectations().len(), 1);

    assert_eq!(get_status(&server, "/twice"), 200);
    assert!(server.expectations().is_empty());

    assert_eq!(get_status(&server, "/twice"), 404);
}

#[test]
fn any_never_leaves_the_queue_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/any").any().reply(200, "");

    // Assert: satisfied without any request
    assert!(server.unsatisfied_expectations().is_empty());

    // Act
    for _ in 0..5 {
        assert_eq!(get_status(&server, "/any"), 200);
    }

    // Assert
    let expectations = server.expectations();
    assert_eq!(expectations.len(), 1);
    assert_eq!(expectations[0].stats.count, 5);
    server.done();
}

#[test]
fn many_requires_one_match_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/many").many().reply(200, "");

    // Assert
    assert_eq!(
        server.verify(),
        Err(Error::UnprocessedExpectations(vec!["GET /many".to_string()]))
    );

    // Act
    get_status(&server, "/many");
    get_status(&server, "/many");

    // Assert
    server.done();
}

#[test]
fn min_and_max_bound_the_matches_test() {
    // Arrange
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server.get("/bounded").min(2).max(3).reply(200, "");

    // Act
    get_status(&server, "/bounded");

    // Assert
    assert_eq!(server.unsatisfied_expectations().len(), 1);

    // Act
    get_status(&server, "/bounded");
    get_status(&server, "/bounded");
    let fourth = get_status(&server, "/bounded");

    // Assert
    assert_eq!(fourth, 404);
    server.done();
}

#[test]
fn max_below_min_lowers_min_test() {
    // Arrange
    let server = MockServer::start();
    server.get("/x").min(5).max(1).reply(200, "");

    // Assert
    let stats = &server.expectations()[0].stats;
    assert_eq!((stats.min, stats.max), (1, Some(1)));
}

#[test]
fn concurrent_requests_never_exceed_max_test() {
    // Arrange
    let server = MockServer::builder()
        .throw_on_unmatched_requests(false)
        .start();
    server.get("/limited").max(3).reply(200, "");

    // Act
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let url = server.url("/limited");
            std::thread::spawn(move || reqwest::blocking::get(url).unwrap().status().as_u16())
        })
        .collect();
    let statuses: Vec<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Assert
    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 3);
    assert_eq!(statuses.iter().filter(|s| **s == 404).count(), 13);
    assert!(server.expectations().is_empty());
    server.done();
}
