use std::io;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use log::{debug, info};

use crate::service::{ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus};
use crate::{Error, Result};

/// A token for updating the status of the running service.
pub trait StatusHandle: Send + Sync + 'static {
    /// Report the new service status to the system.
    fn set_service_status(&self, service_status: &ServiceStatus) -> io::Result<()>;
}

struct Record {
    status: ServiceStatus,
    next_checkpoint: u32,
}

/// Owns the lifecycle status of one service run and pushes every change to the system.
///
/// The record is created in `StartPending` and can only move forward:
/// `StartPending -> Running -> StopPending -> Stopped`. Pending states may be reported again to
/// advance the checkpoint, every other state at most once.
///
/// All updates hold the record lock across the push to the system, so reports from the
/// control handler thread and the service main thread never interleave.
pub struct StatusReporter<H> {
    handle: OnceLock<H>,
    record: Mutex<Record>,
    wait_hint: Duration,
}

impl<H: StatusHandle> StatusReporter<H> {
    pub fn new(wait_hint: Duration) -> Self {
        StatusReporter {
            handle: OnceLock::new(),
            record: Mutex::new(Record {
                status: ServiceStatus {
                    current_state: ServiceState::StartPending,
                    controls_accepted: ServiceControlAccept::empty(),
                    exit_code: ServiceExitCode::NO_ERROR,
                    checkpoint: 0,
                    wait_hint: Duration::default(),
                },
                next_checkpoint: 0,
            }),
            wait_hint,
        }
    }

    /// Attach the status handle obtained when registering the control handler.
    ///
    /// Returns `false` if a handle was already attached, in which case `handle` is dropped.
    pub fn attach(&self, handle: H) -> bool {
        self.handle.set(handle).is_ok()
    }

    pub fn current_state(&self) -> ServiceState {
        self.lock().status.current_state
    }

    /// Move to `state` and report it.
    ///
    /// Pending states get the next checkpoint and the configured wait hint, `Running` and
    /// `Stopped` get a zero checkpoint and wait hint. The record is updated before the push, so
    /// a rejected push still leaves the run in the new state.
    pub fn report(
        &self,
        state: ServiceState,
        controls_accepted: ServiceControlAccept,
        exit_code: ServiceExitCode,
    ) -> Result<ServiceStatus> {
        let handle = self.handle.get().ok_or(Error::NotRegistered)?;
        let mut record = self.lock();

        let current_state = record.status.current_state;
        let moves_forward = state.stage() > current_state.stage();
        let repeats_pending = state == current_state && state.is_pending();
        if !moves_forward && !repeats_pending {
            return Err(Error::InvalidTransition {
                from: current_state,
                to: state,
            });
        }

        let (checkpoint, wait_hint) = if state.is_pending() {
            let checkpoint = record.next_checkpoint;
            record.next_checkpoint += 1;
            (checkpoint, self.wait_hint)
        } else {
            (0, Duration::default())
        };

        record.status = ServiceStatus {
            current_state: state,
            controls_accepted,
            exit_code,
            checkpoint,
            wait_hint,
        };

        if current_state != state {
            info!("Service state {:?} -> {:?}", current_state, state);
        }
        push(handle, &record.status)?;
        Ok(record.status.clone())
    }

    /// Re-report the current pending state with an advanced checkpoint.
    ///
    /// Returns `None` without reporting anything when the current state is not pending.
    pub fn checkpoint(&self) -> Result<Option<ServiceStatus>> {
        let handle = self.handle.get().ok_or(Error::NotRegistered)?;
        let mut record = self.lock();
        if !record.status.current_state.is_pending() {
            return Ok(None);
        }

        record.status.checkpoint = record.next_checkpoint;
        record.next_checkpoint += 1;
        debug!(
            "Service still {:?}, checkpoint {}",
            record.status.current_state, record.status.checkpoint
        );
        push(handle, &record.status)?;
        Ok(Some(record.status.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push<H: StatusHandle>(handle: &H, status: &ServiceStatus) -> Result<()> {
    handle
        .set_service_status(status)
        .map_err(Error::ReportStatus)
}
