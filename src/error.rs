//! Common error types.
//!
//! See [`DeployError`] and [`DeployErrorKind`] for details.
use std::fmt::Display;

/// Main error type for this crate.
#[derive(Debug, thiserror::Error)]
pub struct DeployError {
    kind: DeployErrorKind,
    context: String,
    #[source]
    source: Option<Box<dyn std::error::Error + 'static + Send + Sync>>,
}

impl DeployError {
    /// Creates a new error with the given error kind.
    pub fn new(kind: DeployErrorKind) -> Self {
        Self {
            kind,
            context: String::new(),
            source: None,
        }
    }

    /// Adds a source error.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: std::error::Error + 'static + Send + Sync,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Adds a string with a contextual description of the error.
    pub fn with_context<C>(mut self, value: C) -> Self
    where
        C: AsRef<str>,
    {
        if !self.context.is_empty() {
            self.context.push_str(": ");
        }
        self.context.push_str(value.as_ref());
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &DeployErrorKind {
        &self.kind
    }

    /// Returns the contextual description.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Returns a reference to the IO error when the kind is [`DeployErrorKind::Io`].
    pub fn as_io(&self) -> Option<&std::io::Error> {
        if self.kind.is_io() {
            if let Some(source) = &self.source {
                return source.downcast_ref();
            }
        }
        None
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.context.is_empty() {
            f.write_str(&self.context)?;
            f.write_str(": ")?;
        }

        self.kind.fmt(f)
    }
}

impl From<DeployErrorKind> for DeployError {
    fn from(value: DeployErrorKind) -> Self {
        Self::new(value)
    }
}

impl From<std::io::Error> for DeployError {
    fn from(value: std::io::Error) -> Self {
        Self::new(DeployErrorKind::Io).with_source(value)
    }
}

impl From<AdditionalContext> for DeployError {
    fn from(value: AdditionalContext) -> Self {
        Self::new(DeployErrorKind::Other).with_source(value)
    }
}

/// Error category for [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DeployErrorKind {
    /// Input/Output error usually from [`std::io::Error`].
    #[error("input/output error")]
    Io,

    /// Invalid input or argument type to a function.
    #[error("invalid input or argument")]
    InvalidInput,

    /// [`crate::context::DeployConfig`] has an invalid value.
    #[error("invalid deployment configuration")]
    InvalidConfig,

    /// [`crate::context::DeployConfig`] could not be parsed.
    #[error("malformed deployment configuration")]
    MalformedConfig,

    /// The product catalog could not be parsed.
    #[error("malformed product catalog")]
    MalformedCatalog,

    /// Environment variable was missing or malformed.
    #[error("invalid environment variable")]
    InvalidEnvironmentVariable,

    /// Unsupported OS family ("windows", "unix", etc.).
    #[error("unsupported OS family")]
    UnsupportedOsFamily,

    /// An external installer could not be started.
    #[error("process launch failed")]
    ProcessLaunch,

    /// The files the deployment depends on are not present.
    #[error("deployment bootstrap failed")]
    Bootstrap,

    /// Any other error.
    #[error("other")]
    Other,
}

impl DeployErrorKind {
    /// Returns whether it is the Io variant.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io)
    }
}

/// Modify `Result<T, DeployError>` with context.
pub trait AddDeployContext<T> {
    /// Add context using the given string when Err.
    fn deploy_context<C>(self, context: C) -> Result<T, DeployError>
    where
        C: AsRef<str>;

    /// Add context using the evaluated function when Err.
    fn deploy_contextc<C, CT>(self, context: C) -> Result<T, DeployError>
    where
        C: FnOnce() -> CT,
        CT: AsRef<str>;
}

impl<T> AddDeployContext<T> for Result<T, DeployError> {
    fn deploy_context<C>(self, context: C) -> Result<T, DeployError>
    where
        C: AsRef<str>,
    {
        self.map_err(|error| error.with_context(context.as_ref()))
    }

    fn deploy_contextc<C, CT>(self, context: C) -> Result<T, DeployError>
    where
        C: FnOnce() -> CT,
        CT: AsRef<str>,
    {
        self.map_err(|error| error.with_context(context().as_ref()))
    }
}

/// Contains a contextual description of an error.
///
/// This isn't a real error, but allows injecting context in the error stack.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AdditionalContext {
    message: String,
    #[source]
    source: Box<dyn std::error::Error + Sync + Send + 'static>,
}

impl AdditionalContext {
    /// Creates a new context error with the given message and source error.
    pub fn new<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        Self {
            message,
            source: Box::new(source),
        }
    }
}

/// Trait for wrapping errors in Result with descriptive context strings.
pub trait AddContext<T, E, A> {
    /// Map the error with an error containing the context string.
    fn with_context<C>(self, context: C) -> Result<T, A>
    where
        C: Into<String>;

    /// Map the error with an error containing the context string evaluated from a function.
    fn with_contextc<C, CT>(self, context: C) -> Result<T, A>
    where
        C: FnOnce(&E) -> CT,
        CT: Into<String>;
}

impl<T, E> AddContext<T, E, AdditionalContext> for Result<T, E>
where
    E: std::error::Error + Sync + Send + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T, AdditionalContext>
    where
        C: Into<String>,
    {
        self.map_err(|error| AdditionalContext::new(context.into(), error))
    }

    fn with_contextc<C, CT>(self, context: C) -> Result<T, AdditionalContext>
    where
        C: FnOnce(&E) -> CT,
        CT: Into<String>,
    {
        self.map_err(|error| AdditionalContext::new(context(&error).into(), error))
    }
}

/// Formats the error and its chain of sources, one per line.
pub fn format_error<E>(error: &E) -> String
where
    E: std::error::Error,
{
    let mut buf = error.to_string();
    let mut current: &dyn std::error::Error = error;

    while let Some(source) = current.source() {
        current = source;
        buf.push_str("\n↳");
        buf.push_str(&current.to_string());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let error = DeployError::new(DeployErrorKind::MalformedCatalog)
            .with_context("loading catalog")
            .with_context("optionXML.xml");

        assert_eq!(
            error.to_string(),
            "loading catalog: optionXML.xml: malformed product catalog"
        );
    }

    #[test]
    fn test_format_error_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = DeployError::from(io).with_context("reading config");

        let text = format_error(&error);

        assert_eq!(text, "reading config: input/output error\n↳no such file");
        assert!(error.as_io().is_some());
    }
}
