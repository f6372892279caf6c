//! Common error types for rbdlxc.

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`RbdlxcError`].
pub type RbdlxcResult<T> = Result<T, RbdlxcError>;

/// Errors raised while attaching, mounting or driving containers.
#[derive(Error, Diagnostic, Debug)]
pub enum RbdlxcError {
    /// No container with this name is registered with the runtime.
    #[error("Container not found: {name}")]
    #[diagnostic(code(rbdlxc::container::not_found))]
    ContainerNotFound {
        /// The container name that was looked up.
        name: String,
    },

    /// Container name rejected before it reached a path or a command line.
    #[error("Invalid container name: {name}")]
    #[diagnostic(
        code(rbdlxc::container::invalid_name),
        help("Container names must be 1-64 characters of [A-Za-z0-9._-] and start with an alphanumeric")
    )]
    InvalidContainerName {
        /// The rejected name.
        name: String,
    },

    /// Device path does not name a kernel rbd device.
    #[error("Invalid rbd device: {path}")]
    #[diagnostic(code(rbdlxc::volume::invalid_device), help("Expected /dev/rbd<id>"))]
    InvalidDevice {
        /// The rejected path.
        path: String,
    },

    /// Required request parameter is absent.
    #[error("Missing parameter: {name}")]
    #[diagnostic(code(rbdlxc::request::missing_parameter))]
    MissingParameter {
        /// Parameter name.
        name: String,
    },

    /// Request parameter could not be parsed.
    #[error("Invalid parameter {name}: {value}")]
    #[diagnostic(code(rbdlxc::request::invalid_parameter))]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// The kernel refused or could not receive an attach command.
    #[error("Failed to attach {pool}/{image}: {source}")]
    #[diagnostic(code(rbdlxc::volume::attach))]
    Attach {
        /// Pool holding the image.
        pool: String,
        /// Image name.
        image: String,
        /// Underlying control file error.
        #[source]
        source: std::io::Error,
    },

    /// Attach succeeded but no new device id showed up in the registry.
    #[error("Attached {pool}/{image} but no new rbd device appeared")]
    #[diagnostic(
        code(rbdlxc::volume::unresolved),
        help("Another attach may have raced this one, check /sys/bus/rbd/devices")
    )]
    DeviceNotResolved {
        /// Pool holding the image.
        pool: String,
        /// Image name.
        image: String,
    },

    /// The kernel refused or could not receive a detach command.
    #[error("Failed to detach {device}: {source}")]
    #[diagnostic(code(rbdlxc::volume::detach))]
    Detach {
        /// Device being detached.
        device: String,
        /// Underlying control file error.
        #[source]
        source: std::io::Error,
    },

    /// The pool backing a container's device could not be determined.
    #[error("Pool unknown for container {name}")]
    #[diagnostic(code(rbdlxc::volume::pool_unknown))]
    PoolUnknown {
        /// Container name.
        name: String,
    },

    /// Mounting a container root failed.
    #[error("Failed to mount {device} on {}: {source}", .target.display())]
    #[diagnostic(code(rbdlxc::mount::mount))]
    Mount {
        /// Source device.
        device: String,
        /// Mount point.
        target: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Unmounting a container root failed.
    #[error("Failed to unmount {}: {source}", .target.display())]
    #[diagnostic(code(rbdlxc::mount::unmount))]
    Unmount {
        /// Mount point.
        target: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A transient kernel condition did not clear within the retry ceiling.
    #[error("{operation} of {} still failing after {elapsed:?}: {last}", .target.display())]
    #[diagnostic(code(rbdlxc::mount::retry_exhausted))]
    RetryExhausted {
        /// Operation being retried.
        operation: String,
        /// Mount point.
        target: PathBuf,
        /// Time spent retrying.
        elapsed: Duration,
        /// Last transient error observed.
        last: std::io::Error,
    },

    /// Migration target did not accept the bring-up request.
    #[error("Remote host {host} rejected bring-up: {reason}")]
    #[diagnostic(code(rbdlxc::migrate::rejected))]
    RemoteRejected {
        /// Target host.
        host: String,
        /// Status or transport error.
        reason: String,
    },

    /// Container is in a transitional state that does not allow the request.
    #[error("Container {name} is {state}")]
    #[diagnostic(code(rbdlxc::container::conflict))]
    Conflict {
        /// Container name.
        name: String,
        /// Current runtime state.
        state: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(rbdlxc::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// Container runtime failure.
    #[error("Container runtime error: {message}")]
    #[diagnostic(code(rbdlxc::runtime))]
    Runtime {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(rbdlxc::io))]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(code(rbdlxc::internal))]
    Internal {
        /// The error message.
        message: String,
    },
}

impl RbdlxcError {
    /// Shorthand for [`RbdlxcError::ContainerNotFound`].
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ContainerNotFound { name: name.into() }
    }

    /// Shorthand for [`RbdlxcError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for [`RbdlxcError::Runtime`].
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RbdlxcError::not_found("ghost");
        assert_eq!(err.to_string(), "Container not found: ghost");

        let err = RbdlxcError::Unmount {
            target: PathBuf::from("/var/lib/lxc/web1"),
            source: std::io::Error::from_raw_os_error(16),
        };
        assert!(err.to_string().starts_with("Failed to unmount /var/lib/lxc/web1: "));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RbdlxcError = io_err.into();
        assert!(matches!(err, RbdlxcError::Io(_)));
    }

    #[test]
    fn attach_error_keeps_source() {
        use std::error::Error as _;

        let err = RbdlxcError::Attach {
            pool: "rbd".into(),
            image: "web1".into(),
            source: std::io::Error::from_raw_os_error(2),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("rbd/web1"));
    }
}
