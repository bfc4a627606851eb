use httpexpect::{ByteSource, MockServer};
use rand::Rng;
use std::thread;

#[test]
fn stream_body_is_replayed_for_later_matches_test() {
    // Arrange
    let _ = env_logger::try_init();
    let mut data = vec![0u8; 1000];
    rand::thread_rng().fill(&mut data[..]);

    let chunks: Vec<Vec<u8>> = data.chunks(100).map(|c| c.to_vec()).collect();
    let server = MockServer::start();
    server
        .get("/random")
        .twice()
        .reply(200, ByteSource::from_chunks(chunks));

    // Act
    let first = reqwest::blocking::get(server.url("/random"))
        .unwrap()
        .bytes()
        .unwrap();
    let second = reqwest::blocking::get(server.url("/random"))
        .unwrap()
        .bytes()
        .unwrap();

    // Assert
    assert_eq!(first.to_vec(), data);
    assert_eq!(second.to_vec(), data);
    server.done();
}

#[test]
fn concurrent_requests_receive_the_same_stream_body_test() {
    // Arrange
    let mut data = vec![0u8; 1000];
    rand::thread_rng().fill(&mut data[..]);

    let chunks: Vec<Vec<u8>> = data.chunks(10).map(|c| c.to_vec()).collect();
    let server = MockServer::start();
    server
        .get("/random")
        .times(Some(4), Some(Some(4)))
        .reply(200, ByteSource::from_chunks(chunks));

    // Act
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let url = server.url("/random");
            thread::spawn(move || reqwest::blocking::get(url).unwrap().bytes().unwrap().to_vec())
        })
        .collect();

    // Assert
    for handle in handles {
        assert_eq!(handle.join().unwrap(), data);
    }
    server.done();
}

#[test]
fn large_stream_body_is_piped_test() {
    // Arrange
    let chunk = vec![b'x'; 1024 * 1024];
    let chunks: Vec<Vec<u8>> = (0..10).map(|_| chunk.clone()).collect();

    let server = MockServer::start();
    server
        .get("/large")
        .once()
        .reply(200, ByteSource::from_chunks(chunks));

    // Act
    let body = reqwest::blocking::get(server.url("/large"))
        .unwrap()
        .bytes()
        .unwrap();

    // Assert
    assert_eq!(body.len(), 10 * 1024 * 1024);
    assert!(body.iter().all(|b| *b == b'x'));
    server.done();
}

#[test]
fn file_body_test() {
    // Arrange
    let server = MockServer::start();
    server
        .get("/hello")
        .twice()
        .reply_with_file(200, "tests/resources/simple_body.txt");

    // Act
    let first = reqwest::blocking::get(server.url("/hello")).unwrap().text().unwrap();
    let second = reqwest::blocking::get(server.url("/hello")).unwrap().text().unwrap();

    // Assert
    assert_eq!(first, "ohi!");
    assert_eq!(second, "ohi!");
    server.done();
}

#[test]
fn reader_body_test() {
    // Arrange
    let server = MockServer::start();
    let reader = std::io::Cursor::new(b"read from a reader".to_vec());
    server
        .get("/reader")
        .reply(200, ByteSource::from_reader(reader));

    // Act
    let body = reqwest::blocking::get(server.url("/reader"))
        .unwrap()
        .text()
        .unwrap();

    // Assert
    assert_eq!(body, "read from a reader");
    server.done();
}
