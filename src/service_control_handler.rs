use std::sync::Arc;

use log::{debug, error, info};

use crate::descriptor::ServiceApplication;
use crate::service::{ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState};
use crate::status_reporter::{StatusHandle, StatusReporter};
use crate::stop_signal::StopSignal;
use crate::Error;

/// `NO_ERROR`
const NO_ERROR: u32 = 0;
/// `ERROR_CALL_NOT_IMPLEMENTED`
const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;

/// Abstraction over the return value of service control handler.
///
/// See the "Return value" section of corresponding MSDN article for more info:
///
/// <https://msdn.microsoft.com/en-us/library/windows/desktop/ms683241(v=vs.85).aspx>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceControlHandlerResult {
    /// The control was handled.
    NoError,
    /// The received event is not implemented.
    NotImplemented,
}

impl ServiceControlHandlerResult {
    pub fn to_raw(&self) -> u32 {
        match *self {
            ServiceControlHandlerResult::NoError => NO_ERROR,
            ServiceControlHandlerResult::NotImplemented => ERROR_CALL_NOT_IMPLEMENTED,
        }
    }
}

/// Receives the control codes the system delivers to the service.
///
/// The system serializes deliveries, but they arrive on a thread of its own, concurrently with
/// the service main thread. All state shared with that thread goes through the
/// [`StatusReporter`] lock and the [`StopSignal`].
pub struct ControlHandler<A, H> {
    application: Arc<A>,
    reporter: Arc<StatusReporter<H>>,
    stop_signal: StopSignal,
}

impl<A: ServiceApplication, H: StatusHandle> ControlHandler<A, H> {
    pub fn new(
        application: Arc<A>,
        reporter: Arc<StatusReporter<H>>,
        stop_signal: StopSignal,
    ) -> Self {
        ControlHandler {
            application,
            reporter,
            stop_signal,
        }
    }

    pub fn handle(&self, control: ServiceControl) -> ServiceControlHandlerResult {
        match control {
            ServiceControl::Stop => {
                self.stop();
                ServiceControlHandlerResult::NoError
            }
            // All services must accept Interrogate even if it's a no-op.
            ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
            other => {
                debug!("Ignoring service control {:?}", other);
                ServiceControlHandlerResult::NotImplemented
            }
        }
    }

    fn stop(&self) {
        let current_state = self.reporter.current_state();
        if current_state != ServiceState::Running {
            debug!("Ignoring stop request in state {:?}", current_state);
            return;
        }

        info!("Stop requested");
        self.application.request_stop();

        match self.reporter.report(
            ServiceState::StopPending,
            ServiceControlAccept::empty(),
            ServiceExitCode::NO_ERROR,
        ) {
            Ok(_) => self.stop_signal.set(),
            // The worker finished on its own and the run already moved past Running.
            Err(Error::InvalidTransition { from, .. }) => {
                debug!("Stop request raced with the run ending in {:?}", from);
            }
            Err(e) => {
                error!("Failed to report stop pending: {}", e);
                self.stop_signal.set();
            }
        }
    }
}
