pub(crate) type DynError = Box<dyn std::error::Error + Send + Sync>;

/// The errors that may occur when fetching or normalizing vendor metadata.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    code: Option<u16>,
    message: Option<String>,
    source: Option<DynError>,
}

/// Types of errors that make up an [`Error`].
///
/// The kind decides how the cache layer treats a failed fetch: only
/// [`ErrorKind::NotFound`] may be converted into a cacheable "no such item"
/// marker, every other kind is transient and must be retried on the next
/// access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transport failed before the vendor produced a response.
    Network,
    /// The vendor answered with an error status (throttling or outage).
    Throttled,
    /// The vendor affirmatively reported that no such item exists.
    NotFound,
    /// The vendor response could not be parsed.
    Malformed,
    /// The input identifier is not well formed.
    Format,
}

impl Error {
    /// Creates a new [`Error`] based on the [`ErrorKind`] and message to describe the error.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            code: None,
            message: Some(message.into()),
            source: None,
        }
    }

    /// Wraps an existing error as the source of [`Error`].
    pub fn wrap<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<DynError>,
    {
        Self {
            kind,
            code: None,
            message: None,
            source: Some(source.into()),
        }
    }

    /// Wraps an existing error as the source of [`Error`] with a message to describe the error.
    pub fn wrap_with<E, S>(kind: ErrorKind, source: E, message: S) -> Self
    where
        E: Into<DynError>,
        S: Into<String>,
    {
        Self {
            kind,
            code: None,
            message: Some(message.into()),
            source: Some(source.into()),
        }
    }

    /// Attaches the HTTP status code the vendor answered with.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Returns the kind of error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the HTTP status code the vendor answered with, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        self.code
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ErrorKind::Network => f.write_str("Network error")?,
            ErrorKind::Throttled => f.write_str("Vendor unavailable")?,
            ErrorKind::NotFound => f.write_str("Not found")?,
            ErrorKind::Malformed => f.write_str("Malformed response")?,
            ErrorKind::Format => f.write_str("Invalid identifier")?,
        };

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        if let Some(cause) = &self.source {
            write!(f, ": caused by {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}
