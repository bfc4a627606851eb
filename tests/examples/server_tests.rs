use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use httpexpect::{DeliveryError, IncomingRequest, MockServer, ResponseSink};

#[derive(Default)]
struct RecordingSink {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: BytesMut,
    ended: bool,
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn write_head(&mut self, status: u16, headers: &[(String, String)]) -> Result<(), DeliveryError> {
        self.status = Some(status);
        self.headers = headers.to_vec();
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), DeliveryError> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeliveryError> {
        self.ended = true;
        Ok(())
    }
}

#[test]
fn server_exposes_its_address_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::start();

    // Assert
    let address = server.address().unwrap();
    assert_eq!(server.port(), address.port());
    assert_eq!(server.base_url(), format!("http://{}", address));
    assert_eq!(server.url("/path"), format!("http://{}/path", address));
}

#[test]
fn multiple_servers_are_independent_test() {
    // Arrange
    let first = MockServer::start();
    let second = MockServer::start();
    first.get("/which").reply(200, "first");
    second.get("/which").reply(200, "second");

    // Act
    let a = reqwest::blocking::get(first.url("/which")).unwrap().text().unwrap();
    let b = reqwest::blocking::get(second.url("/which")).unwrap().text().unwrap();

    // Assert
    assert_ne!(first.port(), second.port());
    assert_eq!(a, "first");
    assert_eq!(b, "second");
    first.done();
    second.done();
}

#[test]
fn built_server_does_not_listen_test() {
    // Arrange
    let server = MockServer::builder().build();

    // Assert
    assert!(server.address().is_none());
}

#[tokio::test]
async fn built_server_handles_requests_directly_test() {
    // Arrange
    let server = MockServer::builder().build();
    server
        .post("/direct", "ping")
        .reply_with_headers(202, "pong", vec![("X-Direct", "1")]);
    let mut sink = RecordingSink::default();

    // Act
    let req = IncomingRequest::new("POST", "/direct", vec![], Bytes::from_static(b"ping"));
    server.handle(req, &mut sink).await.unwrap();

    // Assert
    assert_eq!(sink.status, Some(202));
    assert_eq!(sink.headers, vec![("X-Direct".to_string(), "1".to_string())]);
    assert_eq!(&sink.body[..], b"pong");
    assert!(sink.ended);
    server.done();
}

#[tokio::test]
async fn start_async_test() {
    // Arrange
    let _ = env_logger::try_init();
    let server = MockServer::start_async().await.unwrap();
    server.get("/async").reply(200, "async");

    // Act
    let response = reqwest::Client::new()
        .get(server.url("/async"))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "async");
    server.done();
}

#[test]
fn dropping_the_server_stops_the_listener_test() {
    // Arrange
    let server = MockServer::start();
    let url = server.url("/gone");

    // Act
    drop(server);
    std::thread::sleep(std::time::Duration::from_millis(200));

    // Assert
    assert!(reqwest::blocking::get(url).is_err());
}
