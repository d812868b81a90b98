use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream usable as either endpoint of a modem line.
///
/// The terminal side is typically a pseudo-terminal bridge; the network side
/// is typically a TCP stream. Anything async-readable and async-writable
/// works, which is what the test suite relies on.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Owned, type-erased byte stream.
pub type BoxedStream = Box<dyn ByteStream>;
