use std::{fmt, io, io::Cursor, sync::Arc};

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Readable stream produced for one send.
pub type BodyReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Callback producing a fresh reader over the same content on every call.
pub type BodyFactory = Arc<dyn Fn() -> io::Result<BodyReader> + Send + Sync>;

/// Request body.
///
/// In-memory bodies and factory bodies can be resent as-is; reader bodies
/// are one-shot and are buffered before the first attempt.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Buffered(Bytes),
    Factory(BodyFactory),
    Reader(BodyReader),
}

impl Body {
    /// One-shot body read from `reader`.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        Self {
            kind: Kind::Reader(Box::new(reader)),
        }
    }

    /// Body regenerated by `factory` for every attempt.
    ///
    /// The factory must yield identical content on every call.
    pub fn replayable<F>(factory: F) -> Self
    where
        F: Fn() -> io::Result<BodyReader> + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Factory(Arc::new(factory)),
        }
    }

    /// Returns true when the body can be regenerated without buffering.
    pub fn is_replayable(&self) -> bool {
        !matches!(self.kind, Kind::Reader(_))
    }

    /// Length in bytes, when known up front.
    pub fn content_length(&self) -> Option<u64> {
        match &self.kind {
            Kind::Buffered(bytes) => Some(bytes.len() as u64),
            _ => None,
        }
    }

    /// Returns the buffered bytes, if the body is held in memory.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            Kind::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Produces a fresh reader over the body content.
    ///
    /// # Errors
    ///
    /// Fails when the replay factory fails, or for a one-shot reader body
    /// which has no content to regenerate from.
    pub fn regenerate(&self) -> io::Result<BodyReader> {
        match &self.kind {
            Kind::Buffered(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Kind::Factory(factory) => factory(),
            Kind::Reader(_) => Err(io::Error::other("request body is not replayable")),
        }
    }

    /// Converts the body into a `reqwest` body for one send.
    pub(crate) fn to_transport(&self) -> io::Result<reqwest::Body> {
        match &self.kind {
            Kind::Buffered(bytes) => Ok(reqwest::Body::from(bytes.clone())),
            _ => Ok(reqwest::Body::wrap_stream(ReaderStream::new(
                self.regenerate()?,
            ))),
        }
    }

    /// Takes the one-shot reader out of the body, leaving it empty.
    pub(crate) fn take_reader(&mut self) -> Option<BodyReader> {
        match std::mem::replace(&mut self.kind, Kind::Buffered(Bytes::new())) {
            Kind::Reader(reader) => Some(reader),
            other => {
                self.kind = other;
                None
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Buffered(bytes) => f.debug_tuple("Body::Buffered").field(&bytes.len()).finish(),
            Kind::Factory(_) => f.write_str("Body::Replayable"),
            Kind::Reader(_) => f.write_str("Body::Reader"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self {
            kind: Kind::Buffered(bytes),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes::from(bytes).into()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Bytes::from(text).into()
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Bytes::from_static(text.as_bytes()).into()
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Bytes::from_static(bytes).into()
    }
}
