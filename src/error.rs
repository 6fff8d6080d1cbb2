use std::io;

use crate::service::ServiceState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The path of the running executable could not be resolved.
    #[error("Failed to resolve the executable path")]
    ExecutablePath(#[source] io::Error),

    /// Could not open a connection to the service control manager.
    #[error("Failed to connect to the service control manager")]
    ConnectDatabase(#[source] io::Error),

    /// The service control manager refused to create the service entry.
    #[error("Failed to create the service")]
    CreateService(#[source] io::Error),

    /// The service entry could not be opened with the requested access.
    #[error("Failed to open the service")]
    OpenService(#[source] io::Error),

    /// The stop request was rejected for a reason other than the service being inactive.
    #[error("Failed to send the stop request")]
    StopService(#[source] io::Error),

    /// Querying the service status failed.
    #[error("Failed to query the service status")]
    QueryStatus(#[source] io::Error),

    /// The service did not reach the stopped state while it was polled.
    #[error("The service did not stop in time, last observed state: {0:?}")]
    StopTimeout(ServiceState),

    /// The service control manager refused to delete the service entry.
    #[error("Failed to delete the service")]
    DeleteFailed(#[source] io::Error),

    /// Registering the service control handler failed.
    #[error("Failed to register the service control handler")]
    RegisterHandler(#[source] io::Error),

    /// The system rejected a status update.
    #[error("Failed to report the service status")]
    ReportStatus(#[source] io::Error),

    /// A status update was attempted before the control handler was registered.
    #[error("No status handle is registered")]
    NotRegistered,

    /// The requested status transition would move the lifecycle backwards.
    #[error("Invalid service state transition from {from:?} to {to:?}")]
    InvalidTransition { from: ServiceState, to: ServiceState },

    /// The worker thread could not be spawned.
    #[error("Failed to spawn the service worker thread")]
    SpawnWorker(#[source] io::Error),

    /// The service control dispatcher could not be started.
    #[error("Failed to start the service control dispatcher")]
    Dispatcher(#[source] io::Error),
}

impl Error {
    /// Returns the OS error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        use Error::*;
        match self {
            ExecutablePath(err) | ConnectDatabase(err) | CreateService(err) | OpenService(err)
            | StopService(err) | QueryStatus(err) | DeleteFailed(err) | RegisterHandler(err)
            | ReportStatus(err) | SpawnWorker(err) | Dispatcher(err) => err.raw_os_error(),
            StopTimeout(_) | NotRegistered | InvalidTransition { .. } => None,
        }
    }
}
