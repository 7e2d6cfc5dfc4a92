//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Why the call gate refused to run a business method
///
/// Each variant tells the caller which guarantee failed so it can retry,
/// fall back, or surface a 503-equivalent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The component never completed a build pass
    #[error("component '{component}' is not built")]
    NotBuilt {
        /// Component name
        component: String,
    },

    /// The component was destroyed
    #[error("component '{component}' is destroyed")]
    Destroyed {
        /// Component name
        component: String,
    },

    /// The component refuses calls until its next successful rebuild
    #[error("component '{component}' is unavailable")]
    Unavailable {
        /// Component name
        component: String,
    },

    /// Transient outage, retry later without re-resolving
    #[error("component '{component}' is temporarily unavailable")]
    TemporarilyUnavailable {
        /// Component name
        component: String,
    },

    /// This specific method is disabled on the component
    #[error("method '{method}' of component '{component}' is disabled")]
    MethodDisabled {
        /// Component name
        component: String,
        /// Disabled method
        method: String,
    },
}

impl GateError {
    /// Whether the caller should back off and retry the same component
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TemporarilyUnavailable { .. })
    }

    /// Name of the refusing component
    pub fn component(&self) -> &str {
        match self {
            Self::NotBuilt { component }
            | Self::Destroyed { component }
            | Self::Unavailable { component }
            | Self::TemporarilyUnavailable { component }
            | Self::MethodDisabled { component, .. } => component,
        }
    }
}

/// Main error type for the Notifyr service runtime
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Two descriptors share a name
    #[error("Component '{name}' is registered twice")]
    DuplicateComponent {
        /// Duplicated name
        name: String,
    },

    /// A component depends on or links to itself
    #[error("Component '{name}' references itself")]
    SelfReference {
        /// Offending component
        name: String,
    },

    /// Declared dependencies or links form a cycle
    #[error("Circular dependency: {cycle}")]
    CircularDependency {
        /// The cycle, e.g. `a -> b -> a`
        cycle: String,
    },

    /// A dependency or link target is not registered
    #[error("Component '{component}' depends on unknown component '{dependency}'")]
    UnresolvedDependency {
        /// Dependent component
        component: String,
        /// Missing dependency
        dependency: String,
    },

    /// An abstract component could not be resolved to a concrete one
    #[error("Cannot resolve abstract component '{name}': {message}")]
    AbstractResolution {
        /// Abstract name
        name: String,
        /// Why resolution failed
        message: String,
    },

    /// No component with this name
    #[error("Component not found: {name}")]
    ComponentNotFound {
        /// Requested name
        name: String,
    },

    /// The component was pruned from the build plan
    #[error("Component '{name}' was skipped at plan time: {reason}")]
    ComponentSkipped {
        /// Requested name
        name: String,
        /// Why it was pruned
        reason: String,
    },

    /// The component exists but is not of the requested type
    #[error("Component '{name}' is not a {expected}")]
    TypeMismatch {
        /// Requested name
        name: String,
        /// Requested type
        expected: &'static str,
    },

    /// A build pass ended in `Abort`
    #[error("Build of '{component}' aborted: {reason}")]
    BuildAborted {
        /// Aborting component
        component: String,
        /// Abort message
        reason: String,
    },

    /// Link propagation found a cycle at edge level
    #[error("Link cycle detected: {path}")]
    LinkCycle {
        /// The traversed path
        path: String,
    },

    /// The call gate refused the call
    #[error(transparent)]
    Gate(#[from] GateError),

    /// No mini-service for this entity id
    #[error("Mini-service '{id}' does not exist in '{manager}'")]
    MiniServiceNotFound {
        /// Owning manager
        manager: String,
        /// Entity id
        id: String,
    },

    /// A mini-service with this entity id is already pooled
    #[error("Mini-service '{id}' already exists in '{manager}'")]
    MiniServiceAlreadyExists {
        /// Owning manager
        manager: String,
        /// Entity id
        id: String,
    },

    /// A mini-service was addressed on a component that pools none
    #[error("Component '{name}' does not manage mini-services")]
    NotAManager {
        /// Addressed component
        name: String,
    },

    /// Infrastructure operation error
    #[error("Infrastructure error: {message}")]
    Infrastructure {
        /// Description of the infrastructure error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Basic error creation methods
impl Error {
    /// Create a component-not-found error
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::ComponentNotFound { name: name.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }
}

// Configuration error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Plan error creation methods
impl Error {
    /// Create an unresolved dependency error
    pub fn unresolved<C: Into<String>, D: Into<String>>(component: C, dependency: D) -> Self {
        Self::UnresolvedDependency {
            component: component.into(),
            dependency: dependency.into(),
        }
    }

    /// Create a circular dependency error from the cycle path
    pub fn circular<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cycle = path
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::CircularDependency { cycle }
    }

    /// Whether this error must prevent the process from starting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CircularDependency { .. }
                | Self::UnresolvedDependency { .. }
                | Self::DuplicateComponent { .. }
                | Self::SelfReference { .. }
                | Self::AbstractResolution { .. }
                | Self::BuildAborted { .. }
                | Self::Configuration { .. }
        )
    }
}
