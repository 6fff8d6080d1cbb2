use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use crate::descriptor::{ServeError, ServiceApplication, ServiceDescriptor};
use crate::service::{ServiceControlAccept, ServiceExitCode, ServiceState};
use crate::service_control_handler::ControlHandler;
use crate::service_dispatcher::ServiceHost;
use crate::status_reporter::{StatusHandle, StatusReporter};
use crate::stop_signal::StopSignal;
use crate::{worker, Error, Result};

/// Exit code reported when the worker failed or panicked.
const WORKER_FAILED: ServiceExitCode = ServiceExitCode::ServiceSpecific(1);

const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Run one activation of the service. Called from the service main function.
///
/// Registers the control handler, reports `StartPending` and `Running`, runs the worker loop
/// on its own thread and blocks until it exits, then reports `Stopped`. Returns the exit code
/// reported with `Stopped`.
pub fn run_service<A, H>(descriptor: &ServiceDescriptor<A>, host: &H) -> Result<ServiceExitCode>
where
    A: ServiceApplication,
    H: ServiceHost,
{
    let options = descriptor.options;
    let reporter: Arc<StatusReporter<H::StatusHandle>> =
        Arc::new(StatusReporter::new(options.wait_hint));
    let stop_signal = StopSignal::new();

    let handler = ControlHandler::new(
        descriptor.application.clone(),
        reporter.clone(),
        stop_signal.clone(),
    );
    let status_handle = host
        .register_control_handler(&descriptor.name, move |control| handler.handle(control))
        .map_err(Error::RegisterHandler)?;
    reporter.attach(status_handle);

    reporter.report(
        ServiceState::StartPending,
        ServiceControlAccept::empty(),
        ServiceExitCode::NO_ERROR,
    )?;
    reporter.report(
        ServiceState::Running,
        ServiceControlAccept::STOP,
        ServiceExitCode::NO_ERROR,
    )?;

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let application = descriptor.application.clone();
    let worker_signal = stop_signal.clone();
    let spawn_result = thread::Builder::new()
        .name("service-worker".to_owned())
        .spawn(move || {
            // Dropped when the loop returns or unwinds, waking the service main thread.
            let _done = done_tx;
            worker::run(&*application, &worker_signal, options.pacing_interval, options.pacing)
        });
    let worker = match spawn_result {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to spawn the service worker: {}", e);
            let exit_code = e
                .raw_os_error()
                .map_or(WORKER_FAILED, |code| ServiceExitCode::Win32(code as u32));
            reporter.report(ServiceState::Stopped, ServiceControlAccept::empty(), exit_code)?;
            return Err(Error::SpawnWorker(e));
        }
    };
    info!("Service {} is running", descriptor.name.to_string_lossy());

    let progress_interval = (options.wait_hint / 2).max(MIN_PROGRESS_INTERVAL);
    let exit_code = match wait_for_worker(worker, &done_rx, &reporter, progress_interval) {
        Ok(()) => ServiceExitCode::NO_ERROR,
        Err(e) => {
            error!("Service worker failed: {}", e);
            WORKER_FAILED
        }
    };
    drop(stop_signal);

    reporter.report(ServiceState::Stopped, ServiceControlAccept::empty(), exit_code)?;
    info!("Service {} stopped", descriptor.name.to_string_lossy());
    Ok(exit_code)
}

/// Block until the worker thread exits, advancing the checkpoint while a stop is pending.
fn wait_for_worker<H: StatusHandle>(
    worker: JoinHandle<std::result::Result<(), ServeError>>,
    done_rx: &mpsc::Receiver<()>,
    reporter: &StatusReporter<H>,
    progress_interval: Duration,
) -> std::result::Result<(), ServeError> {
    loop {
        match done_rx.recv_timeout(progress_interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = reporter.checkpoint() {
                    warn!("Failed to report stop progress: {}", e);
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    match worker.join() {
        Ok(result) => result,
        Err(_) => Err("service worker panicked".into()),
    }
}
