use std::fmt::Display;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Wrapping
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<Error>,
    },

    // Network bootstrap
    #[error("{0}")]
    NetworkSetup(String),
    #[error("Command {0:?} failed: {1}")]
    CommandError(Vec<String>, String),
    #[error("Failed to run command {0:?}: {1}")]
    CommandSpawn(Vec<String>, std::io::Error),

    // Metadata HTTP requests
    #[error("Request failed, response: Response{{ StatusCode: {status_code}, Status: '{status}' }}")]
    RequestFailed { status_code: u16, status: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid metadata header {0}: {1}")]
    InvalidHeader(String, String),
    #[error("Response body is not valid UTF-8: {0}")]
    InvalidBody(#[from] std::string::FromUtf8Error),

    // User data decoding
    #[error("{0}")]
    Base64(#[from] base64::DecodeError),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    MissingField(String),

    // DNS
    #[error("{0}")]
    DnsResolution(String),
    #[error("{0}")]
    Resolve(#[from] hickory_resolver::error::ResolveError),

    // Config
    #[error("Error reading config file {0}: {1}")]
    ConfigRead(String, std::io::Error),
    #[error("Error parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Error parsing value: {0}")]
    ParseHumanize(#[from] humanize_rs::ParseError),
    #[error("Error setting up tracing: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),

    // Custom/generic
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Timed out waiting for operation: {0}")]
    Timeout(String),
}

impl Error {
    /// Wrap this error with a short description of what was being attempted.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every layer of context removed.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }
}

pub trait ResultExt<T> {
    fn wrap_err<C>(self, context: C) -> Result<T, Error>
    where
        C: Display;

    fn wrap_err_with<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Error>,
{
    fn wrap_err<C>(self, context: C) -> Result<T, Error>
    where
        C: Display,
    {
        self.map_err(|e| e.into().wrap(context.to_string()))
    }

    fn wrap_err_with<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().wrap(f().to_string()))
    }
}
