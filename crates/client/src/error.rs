use hrchat_core::protocol::ProtocolError;

/// Errors surfaced by the chat client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status and a `{error, code}` body.
    #[error("HTTP {status} ({code}): {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },

    /// Connection refused, reset, or interrupted.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server sent something the client cannot interpret.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A request, or the wait for the next reply event, ran out of time.
    #[error("Timed out waiting for the reply")]
    Timeout,

    /// The stream ended before its terminal event.
    #[error("Stream closed before the reply finished")]
    StreamClosed,
}

impl ClientError {
    /// Status code for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Event-stream failures other than a bad status, which
/// [`crate::transport::HttpTransport`] reads into [`ClientError::Http`].
impl From<reqwest_eventsource::Error> for ClientError {
    fn from(err: reqwest_eventsource::Error) -> Self {
        use reqwest_eventsource::Error;

        match err {
            Error::StreamEnded => ClientError::StreamClosed,
            Error::Transport(err) => err.into(),
            Error::Utf8(_) | Error::Parser(_) | Error::InvalidContentType(..) => {
                ClientError::Decode(err.to_string())
            }
            other => ClientError::Transport(other.to_string()),
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        ClientError::Decode(err.to_string())
    }
}
