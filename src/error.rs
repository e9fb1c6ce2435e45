use crate::authz::Capability;

/// Failure of the outbound HTTP hop to a push service.
///
/// These are network-level failures; a push service that answered with an
/// unexpected status is reported as [`Error::Protocol`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect(String),
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => f.write_str("push request timed out"),
            TransportError::Connect(detail) => {
                write!(f, "failed to reach push service: {detail}")
            }
            TransportError::Other(detail) => write!(f, "push request failed: {detail}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure of a document-store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique index rejected the insert; carries the index name.
    Duplicate(&'static str),
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Duplicate(index) => write!(f, "duplicate record on index '{index}'"),
            StoreError::Backend(detail) => write!(f, "store backend error: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug)]
pub enum Error {
    KeyNotFound { id: String },
    SubscriptionNotFound { id: String },
    PermissionDenied { capability: Capability },
    DuplicateKey { id: String },
    DuplicateSubscription { endpoint: String },
    /// The push service answered with a status other than 201.
    Protocol { subscription: String, status: u16 },
    Transport(TransportError),
    /// Building the outbound push request failed (signing or encryption).
    Request(String),
    Store(StoreError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::KeyNotFound { id } => write!(f, "VAPID key not found: {id}"),
            Error::SubscriptionNotFound { id } => write!(f, "subscription not found: {id}"),
            Error::PermissionDenied { capability } => {
                write!(f, "permission denied: {capability}")
            }
            Error::DuplicateKey { id } => write!(f, "duplicate VAPID key: {id}"),
            Error::DuplicateSubscription { endpoint } => {
                write!(f, "duplicate subscription for endpoint {endpoint}")
            }
            Error::Protocol {
                subscription,
                status,
            } => write!(
                f,
                "unexpected response code {status} from push service for {subscription}"
            ),
            Error::Transport(err) => write!(f, "{err}"),
            Error::Request(detail) => write!(f, "failed to build push request: {detail}"),
            Error::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Store(err) => Some(err),
            _ => None,
        }
    }
}
