//! In-memory stand-ins for the system collaborators, used by the unit tests.

use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::descriptor::{ServeError, ServiceApplication};
use crate::service::{
    ServiceAccess, ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceInfo,
    ServiceManagerAccess, ServiceState, ServiceStatus,
};
use crate::service_control_handler::ServiceControlHandlerResult;
use crate::service_dispatcher::ServiceHost;
use crate::service_manager::{ManagedService, ServiceControlManager, ServiceDatabase};
use crate::status_reporter::StatusHandle;

const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: i32 = 1061;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;
const ERROR_SERVICE_EXISTS: i32 = 1073;
const ERROR_SERVICE_MARKED_FOR_DELETE: i32 = 1072;

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

#[derive(Default)]
pub struct MockApplication {
    serve_calls: AtomicUsize,
    stop_requests: AtomicUsize,
    failure: Mutex<Option<(usize, io::Error)>>,
    panic_at: Mutex<Option<usize>>,
    serve_delay: Mutex<Duration>,
}

impl MockApplication {
    pub fn serve_calls(&self) -> usize {
        self.serve_calls.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }

    /// Make the `call`-th invocation of `serve` fail with `error`.
    pub fn fail_on_call(&self, call: usize, error: io::Error) {
        *lock(&self.failure) = Some((call, error));
    }

    /// Make the `call`-th invocation of `serve` panic.
    pub fn panic_on_call(&self, call: usize) {
        *lock(&self.panic_at) = Some(call);
    }

    pub fn set_serve_delay(&self, delay: Duration) {
        *lock(&self.serve_delay) = delay;
    }
}

impl ServiceApplication for MockApplication {
    fn serve(&self) -> Result<(), ServeError> {
        let call = self.serve_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *lock(&self.serve_delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let panic_at = *lock(&self.panic_at);
        if panic_at == Some(call) {
            panic!("serve call {} panicked", call);
        }

        let mut failure = lock(&self.failure);
        if matches!(*failure, Some((fail_at, _)) if fail_at == call) {
            if let Some((_, error)) = failure.take() {
                return Err(Box::new(error));
            }
        }
        Ok(())
    }

    fn request_stop(&self) {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every accepted status update.
#[derive(Debug, Clone, Default)]
pub struct MockStatusHandle {
    history: Arc<Mutex<Vec<ServiceStatus>>>,
    reject_with: Arc<Mutex<Option<i32>>>,
}

impl MockStatusHandle {
    pub fn history(&self) -> Vec<ServiceStatus> {
        lock(&self.history).clone()
    }

    pub fn last_state(&self) -> Option<ServiceState> {
        lock(&self.history).last().map(|status| status.current_state)
    }

    /// Fail every following update with the given OS error code.
    pub fn reject_updates(&self, code: i32) {
        *lock(&self.reject_with) = Some(code);
    }
}

impl StatusHandle for MockStatusHandle {
    fn set_service_status(&self, service_status: &ServiceStatus) -> io::Result<()> {
        if let Some(code) = *lock(&self.reject_with) {
            return Err(io::Error::from_raw_os_error(code));
        }
        lock(&self.history).push(service_status.clone());
        Ok(())
    }
}

type EventHandler = Box<dyn FnMut(ServiceControl) -> ServiceControlHandlerResult + Send>;

#[derive(Default)]
struct HostState {
    event_handler: Option<EventHandler>,
    registered_name: Option<OsString>,
    fail_register: Option<i32>,
    fail_dispatcher: Option<i32>,
    dispatched: usize,
}

/// Plays the role of the service control dispatcher and control handler registry.
#[derive(Clone, Default)]
pub struct MockServiceHost {
    state: Arc<Mutex<HostState>>,
    status_handle: MockStatusHandle,
}

impl MockServiceHost {
    pub fn status_handle(&self) -> &MockStatusHandle {
        &self.status_handle
    }

    pub fn registered_name(&self) -> Option<OsString> {
        lock(&self.state).registered_name.clone()
    }

    pub fn dispatched(&self) -> usize {
        lock(&self.state).dispatched
    }

    pub fn fail_register(&self, code: i32) {
        lock(&self.state).fail_register = Some(code);
    }

    pub fn fail_dispatcher(&self, code: i32) {
        lock(&self.state).fail_dispatcher = Some(code);
    }

    /// Deliver a control code the way the system does: one at a time, on the caller's thread.
    pub fn send_control(&self, control: ServiceControl) -> Option<ServiceControlHandlerResult> {
        let mut state = lock(&self.state);
        state.event_handler.as_mut().map(|handler| handler(control))
    }
}

impl ServiceHost for MockServiceHost {
    type StatusHandle = MockStatusHandle;

    fn register_control_handler<F>(
        &self,
        service_name: &OsStr,
        event_handler: F,
    ) -> io::Result<MockStatusHandle>
    where
        F: FnMut(ServiceControl) -> ServiceControlHandlerResult + Send + 'static,
    {
        let mut state = lock(&self.state);
        if let Some(code) = state.fail_register {
            return Err(io::Error::from_raw_os_error(code));
        }
        state.registered_name = Some(service_name.to_os_string());
        state.event_handler = Some(Box::new(event_handler));
        Ok(self.status_handle.clone())
    }

    fn start_dispatcher<F>(&self, service_name: &OsStr, service_main: F) -> io::Result<()>
    where
        F: FnOnce(Vec<OsString>) + Send + 'static,
    {
        {
            let mut state = lock(&self.state);
            if let Some(code) = state.fail_dispatcher {
                return Err(io::Error::from_raw_os_error(code));
            }
            state.dispatched += 1;
        }
        let arguments = vec![service_name.to_os_string()];
        thread::spawn(move || service_main(arguments))
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "service main panicked"))
    }
}

struct MockEntry {
    info: ServiceInfo,
    state: ServiceState,
    /// Number of polls a stopping service stays in `StopPending`. `None` never stops.
    stop_pending_polls: Option<u32>,
    /// The service stops on its own right before the next stop control arrives.
    stops_before_control: bool,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<OsString, MockEntry>,
    fail_connect: Option<i32>,
    fail_delete: Option<i32>,
    opened_handles: usize,
    closed_handles: usize,
    status_queries: usize,
    stop_requests: usize,
}

/// A services database kept in memory.
#[derive(Clone, Default)]
pub struct MockServiceManager {
    registry: Arc<Mutex<Registry>>,
}

impl MockServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn installed(&self, name: &str) -> Option<ServiceInfo> {
        lock(&self.registry)
            .entries
            .get(OsStr::new(name))
            .map(|entry| entry.info.clone())
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.registry).entries.is_empty()
    }

    /// Put an installed service in `Running`. Once stopped it stays in `StopPending` for
    /// `stop_pending_polls` status queries.
    pub fn set_running(&self, name: &str, stop_pending_polls: Option<u32>) {
        let mut registry = lock(&self.registry);
        let entry = registry.entries.get_mut(OsStr::new(name)).unwrap();
        entry.state = ServiceState::Running;
        entry.stop_pending_polls = stop_pending_polls;
    }

    /// Put an installed service in `StopPending`, as if someone else had stopped it. It stays
    /// there for `polls` status queries.
    pub fn set_stopping(&self, name: &str, polls: u32) {
        let mut registry = lock(&self.registry);
        let entry = registry.entries.get_mut(OsStr::new(name)).unwrap();
        entry.state = ServiceState::StopPending;
        entry.stop_pending_polls = Some(polls);
    }

    pub fn set_start_pending(&self, name: &str) {
        let mut registry = lock(&self.registry);
        let entry = registry.entries.get_mut(OsStr::new(name)).unwrap();
        entry.state = ServiceState::StartPending;
    }

    /// Make the service exit between the status query and the stop control.
    pub fn stop_before_control(&self, name: &str) {
        let mut registry = lock(&self.registry);
        let entry = registry.entries.get_mut(OsStr::new(name)).unwrap();
        entry.stops_before_control = true;
    }

    pub fn fail_connect(&self, code: i32) {
        lock(&self.registry).fail_connect = Some(code);
    }

    pub fn fail_delete(&self, code: i32) {
        lock(&self.registry).fail_delete = Some(code);
    }

    pub fn open_handles(&self) -> usize {
        let registry = lock(&self.registry);
        registry.opened_handles - registry.closed_handles
    }

    pub fn closed_handles(&self) -> usize {
        lock(&self.registry).closed_handles
    }

    pub fn status_queries(&self) -> usize {
        lock(&self.registry).status_queries
    }

    pub fn stop_requests(&self) -> usize {
        lock(&self.registry).stop_requests
    }

    fn open_handle(&self) {
        lock(&self.registry).opened_handles += 1;
    }

    fn close_handle(&self) {
        lock(&self.registry).closed_handles += 1;
    }
}

fn status(state: ServiceState) -> ServiceStatus {
    ServiceStatus {
        current_state: state,
        controls_accepted: ServiceControlAccept::empty(),
        exit_code: ServiceExitCode::NO_ERROR,
        checkpoint: 0,
        wait_hint: Duration::default(),
    }
}

impl ServiceControlManager for MockServiceManager {
    type Connection = MockConnection;

    fn connect(&self, _request_access: ServiceManagerAccess) -> io::Result<MockConnection> {
        if let Some(code) = lock(&self.registry).fail_connect {
            return Err(io::Error::from_raw_os_error(code));
        }
        self.open_handle();
        Ok(MockConnection {
            manager: self.clone(),
        })
    }
}

pub struct MockConnection {
    manager: MockServiceManager,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.manager.close_handle();
    }
}

impl ServiceDatabase for MockConnection {
    type Service = MockService;

    fn create_service(
        &self,
        service_info: &ServiceInfo,
        _service_access: ServiceAccess,
    ) -> io::Result<MockService> {
        {
            let mut registry = lock(&self.manager.registry);
            if registry.entries.contains_key(&service_info.name) {
                return Err(io::Error::from_raw_os_error(ERROR_SERVICE_EXISTS));
            }
            registry.entries.insert(
                service_info.name.clone(),
                MockEntry {
                    info: service_info.clone(),
                    state: ServiceState::Stopped,
                    stop_pending_polls: Some(0),
                    stops_before_control: false,
                },
            );
        }
        self.manager.open_handle();
        Ok(MockService {
            manager: self.manager.clone(),
            name: service_info.name.clone(),
        })
    }

    fn open_service(&self, name: &OsStr, _request_access: ServiceAccess) -> io::Result<MockService> {
        if !lock(&self.manager.registry).entries.contains_key(name) {
            return Err(io::Error::from_raw_os_error(ERROR_SERVICE_DOES_NOT_EXIST));
        }
        self.manager.open_handle();
        Ok(MockService {
            manager: self.manager.clone(),
            name: name.to_os_string(),
        })
    }
}

pub struct MockService {
    manager: MockServiceManager,
    name: OsString,
}

impl MockService {
    fn with_entry<T>(&self, f: impl FnOnce(&mut Registry) -> io::Result<T>) -> io::Result<T> {
        let mut registry = lock(&self.manager.registry);
        if !registry.entries.contains_key(&self.name) {
            return Err(io::Error::from_raw_os_error(ERROR_SERVICE_MARKED_FOR_DELETE));
        }
        f(&mut registry)
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.manager.close_handle();
    }
}

impl ManagedService for MockService {
    fn query_status(&self) -> io::Result<ServiceStatus> {
        let name = self.name.clone();
        self.with_entry(move |registry| {
            registry.status_queries += 1;
            let entry = registry.entries.get_mut(&name).unwrap();
            if entry.state == ServiceState::StopPending {
                entry.stop_pending_polls = match entry.stop_pending_polls {
                    Some(0) => {
                        entry.state = ServiceState::Stopped;
                        Some(0)
                    }
                    Some(remaining) => Some(remaining - 1),
                    None => None,
                };
            }
            Ok(status(entry.state))
        })
    }

    fn stop(&self) -> io::Result<ServiceStatus> {
        let name = self.name.clone();
        self.with_entry(move |registry| {
            let entry = registry.entries.get_mut(&name).unwrap();
            if entry.stops_before_control {
                entry.stops_before_control = false;
                entry.state = ServiceState::Stopped;
            }
            match entry.state {
                ServiceState::Stopped => {
                    return Err(io::Error::from_raw_os_error(ERROR_SERVICE_NOT_ACTIVE));
                }
                ServiceState::StartPending | ServiceState::StopPending => {
                    return Err(io::Error::from_raw_os_error(ERROR_SERVICE_CANNOT_ACCEPT_CTRL));
                }
                ServiceState::Running => (),
            }
            entry.state = ServiceState::StopPending;
            registry.stop_requests += 1;
            Ok(status(ServiceState::StopPending))
        })
    }

    fn delete(self) -> io::Result<()> {
        let name = self.name.clone();
        self.with_entry(move |registry| {
            if let Some(code) = registry.fail_delete {
                return Err(io::Error::from_raw_os_error(code));
            }
            registry.entries.remove(&name);
            Ok(())
        })
    }
}
