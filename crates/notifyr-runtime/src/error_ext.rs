//! Mapping foreign errors onto the domain error
//!
//! ```ignore
//! std::fs::write(&path, contents).io_context("Failed to write config file")?;
//! ```

use notifyr_domain::error::{Error, Result};
use std::fmt::Display;

type Source = Box<dyn std::error::Error + Send + Sync>;

/// Attach a message to a foreign error while converting it
pub trait ErrorContext<T> {
    /// Wrap as `Error::Infrastructure`
    fn context<C: Display>(self, message: C) -> Result<T>;

    /// Wrap as `Error::Io`
    fn io_context<C: Display>(self, message: C) -> Result<T>;

    /// Wrap as `Error::Configuration`
    fn config_context<C: Display>(self, message: C) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C: Display>(self, message: C) -> Result<T> {
        self.map_err(|err| {
            let (message, source) = describe(message, err);
            Error::Infrastructure { message, source }
        })
    }

    fn io_context<C: Display>(self, message: C) -> Result<T> {
        self.map_err(|err| {
            let (message, source) = describe(message, err);
            Error::Io { message, source }
        })
    }

    fn config_context<C: Display>(self, message: C) -> Result<T> {
        self.map_err(|err| {
            let (message, source) = describe(message, err);
            Error::Configuration { message, source }
        })
    }
}

fn describe<C, E>(message: C, err: E) -> (String, Option<Source>)
where
    C: Display,
    E: std::error::Error + Send + Sync + 'static,
{
    (format!("{message}: {err}"), Some(Box::new(err)))
}

/// A blocking job that panicked or was cancelled
pub(crate) fn join_error(component: &str, err: tokio::task::JoinError) -> Error {
    Error::Infrastructure {
        message: format!("blocking job for '{component}' did not complete: {err}"),
        source: Some(Box::new(err)),
    }
}
