use std::ffi::{OsStr, OsString};
use std::io;

use crate::service::ServiceControl;
use crate::service_control_handler::ServiceControlHandlerResult;
use crate::status_reporter::StatusHandle;

/// The process side of the service control manager: the dispatcher that calls the service
/// main function and the registry of control handlers.
pub trait ServiceHost: Clone + Send + 'static {
    type StatusHandle: StatusHandle;

    /// Register a closure for receiving service events.
    ///
    /// Returns the handle used to report the service status back to the system.
    fn register_control_handler<F>(
        &self,
        service_name: &OsStr,
        event_handler: F,
    ) -> io::Result<Self::StatusHandle>
    where
        F: FnMut(ServiceControl) -> ServiceControlHandlerResult + Send + 'static;

    /// Start service control dispatcher.
    ///
    /// Blocks the current thread until the service is stopped. `service_main` is called on a
    /// background thread with the arguments the service was started with.
    fn start_dispatcher<F>(&self, service_name: &OsStr, service_main: F) -> io::Result<()>
    where
        F: FnOnce(Vec<OsString>) + Send + 'static;
}
