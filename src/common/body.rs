use bytes::{Bytes, BytesMut};
use futures_util::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use serde_json::Value;
use std::{
    fmt,
    io,
    path::{Path, PathBuf},
};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt},
};

const READ_CHUNK_SIZE: usize = 8 * 1024;

// ************************************************************************************************
// ByteSource
// ************************************************************************************************
/// A lazy, single-pass producer of body bytes.
///
/// A `ByteSource` can be drained only once. When it is used as the response body of an
/// expectation that may match more than once, the first delivery buffers everything it
/// reads and later deliveries replay that buffer.
pub struct ByteSource {
    inner: BoxStream<'static, io::Result<Bytes>>,
}

impl ByteSource {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Creates a source that yields the given chunks in order.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::from_stream(stream::iter(chunks).map(|chunk| Ok(chunk.into())))
    }

    /// Creates a source that reads from `reader` in chunks until EOF.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::from_stream(stream::try_unfold(reader, |mut reader| async move {
            let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
            let read = reader.read_buf(&mut buf).await?;
            if read == 0 {
                return Ok(None);
            }
            Ok(Some((buf.freeze(), reader)))
        }))
    }

    /// Creates a source for a file. The file is opened on first read, not here.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        enum FileState {
            Closed(PathBuf),
            Open(File),
        }

        let state = FileState::Closed(path.as_ref().to_path_buf());
        Self::from_stream(stream::try_unfold(state, |state| async move {
            let mut file = match state {
                FileState::Closed(path) => {
                    tracing::trace!("Opening response body file {}", path.display());
                    File::open(&path).await?
                }
                FileState::Open(file) => file,
            };

            let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
            let read = file.read_buf(&mut buf).await?;
            if read == 0 {
                return Ok(None);
            }
            Ok(Some((buf.freeze(), FileState::Open(file))))
        }))
    }

    pub(crate) async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }

    /// Drains the source into a single buffer.
    pub async fn collect(mut self) -> io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteSource")
    }
}

// ************************************************************************************************
// ResponseBody
// ************************************************************************************************
/// The body an expectation replies with. The variant is fixed when the reply is
/// configured.
#[derive(Debug)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
    /// Serialized to its JSON string form before it is written.
    Json(Value),
    Stream(ByteSource),
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Text(String::new())
    }
}

impl From<&str> for ResponseBody {
    fn from(value: &str) -> Self {
        ResponseBody::Text(value.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        ResponseBody::Text(value)
    }
}

impl From<&String> for ResponseBody {
    fn from(value: &String) -> Self {
        ResponseBody::Text(value.clone())
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        ResponseBody::Bytes(value)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        ResponseBody::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for ResponseBody {
    fn from(value: &[u8]) -> Self {
        ResponseBody::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for ResponseBody {
    fn from(value: &[u8; N]) -> Self {
        ResponseBody::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        ResponseBody::Json(value)
    }
}

impl From<ByteSource> for ResponseBody {
    fn from(value: ByteSource) -> Self {
        ResponseBody::Stream(value)
    }
}

// ************************************************************************************************
// ExpectedBody
// ************************************************************************************************
/// The request body an expectation requires, normalized to a string. Structured values
/// are stored in their serialized JSON form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedBody(pub(crate) String);

impl ExpectedBody {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExpectedBody {
    fn from(value: &str) -> Self {
        ExpectedBody(value.to_string())
    }
}

impl From<String> for ExpectedBody {
    fn from(value: String) -> Self {
        ExpectedBody(value)
    }
}

impl From<&String> for ExpectedBody {
    fn from(value: &String) -> Self {
        ExpectedBody(value.clone())
    }
}

impl From<Value> for ExpectedBody {
    fn from(value: Value) -> Self {
        ExpectedBody(value.to_string())
    }
}

impl From<&Value> for ExpectedBody {
    fn from(value: &Value) -> Self {
        ExpectedBody(value.to_string())
    }
}
