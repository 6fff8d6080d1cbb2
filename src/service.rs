use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// `SERVICE_WIN32_OWN_PROCESS`. The only service type this crate installs and reports.
pub(crate) const SERVICE_WIN32_OWN_PROCESS: u32 = 0x0000_0010;

/// `ERROR_SERVICE_SPECIFIC_ERROR`, used to mark a service specific exit code.
const ERROR_SERVICE_SPECIFIC_ERROR: u32 = 1066;

bitflags::bitflags! {
    /// Flags describing the access permissions when working with services
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceAccess: u32 {
        /// Can query the service status
        const QUERY_STATUS = 0x0004;

        /// Can stop the service
        const STOP = 0x0020;

        /// Can delete the service
        const DELETE = 0x0001_0000;
    }
}

bitflags::bitflags! {
    /// Flags describing access permissions for the service control manager.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceManagerAccess: u32 {
        /// Can connect to service control manager.
        const CONNECT = 0x0001;

        /// Can create services.
        const CREATE_SERVICE = 0x0002;
    }
}

bitflags::bitflags! {
    /// Flags describing accepted types of service control events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceControlAccept: u32 {
        /// The service can be stopped.
        const STOP = 0x0001;
    }
}

/// Error returned when a raw integer does not map onto one of the enums in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseRawError {
    #[error("Invalid integer value for the target type: {0}")]
    InvalidInteger(u32),
}

/// Enum describing the start options for windows services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceStartType {
    /// Autostart on system startup
    AutoStart = 0x0000_0002,
    /// Service is enabled, can be started manually
    OnDemand = 0x0000_0003,
    /// Disabled service
    Disabled = 0x0000_0004,
}

impl ServiceStartType {
    pub fn to_raw(&self) -> u32 {
        *self as u32
    }
}

/// Error handling strategy for service failures.
///
/// See <https://msdn.microsoft.com/en-us/library/windows/desktop/ms682450(v=vs.85).aspx>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceErrorControl {
    Critical = 0x0000_0003,
    Ignore = 0x0000_0000,
    Normal = 0x0000_0001,
    Severe = 0x0000_0002,
}

impl ServiceErrorControl {
    pub fn to_raw(&self) -> u32 {
        *self as u32
    }
}

/// Service dependency descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceDependency {
    Service(OsString),
    Group(OsString),
}

impl ServiceDependency {
    pub fn to_system_identifier(&self) -> OsString {
        match *self {
            ServiceDependency::Service(ref name) => name.to_owned(),
            ServiceDependency::Group(ref name) => {
                // since services and service groups share the same namespace the group identifiers
                // should be prefixed with '+' (SC_GROUP_IDENTIFIER)
                let mut group_identifier = OsString::new();
                group_identifier.push("+");
                group_identifier.push(name);
                group_identifier
            }
        }
    }
}

/// The entry that gets written to the system services registry on install.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceInfo {
    /// Service name
    pub name: OsString,

    /// User-friendly service name
    pub display_name: OsString,

    /// The service startup options
    pub start_type: ServiceStartType,

    /// The severity of the error, and action taken, if this service fails to start.
    pub error_control: ServiceErrorControl,

    /// Path to the service binary
    pub executable_path: PathBuf,

    /// Launch arguments passed to `main` when system starts the service.
    pub launch_arguments: Vec<OsString>,

    /// Service dependencies
    pub dependencies: Vec<ServiceDependency>,

    /// Account to use for running the service.
    /// use `None` to run as LocalSystem.
    pub account_name: Option<OsString>,

    /// Account password.
    /// For system accounts this should normally be `None`.
    pub account_password: Option<OsString>,
}

/// Enum describing the service control operations.
///
/// Only the controls a single start/stop service can receive are listed. Everything else the
/// system delivers fails to parse and is answered as not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceControl {
    Stop = 0x0000_0001,
    Interrogate = 0x0000_0004,
    Shutdown = 0x0000_0005,
}

impl ServiceControl {
    pub fn from_raw(raw_value: u32) -> Result<Self, ParseRawError> {
        match raw_value {
            x if x == ServiceControl::Stop.to_raw() => Ok(ServiceControl::Stop),
            x if x == ServiceControl::Interrogate.to_raw() => Ok(ServiceControl::Interrogate),
            x if x == ServiceControl::Shutdown.to_raw() => Ok(ServiceControl::Shutdown),
            other => Err(ParseRawError::InvalidInteger(other)),
        }
    }

    pub fn to_raw(&self) -> u32 {
        *self as u32
    }
}

/// Service state returned as a part of [`ServiceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ServiceState {
    StartPending = 0x0000_0002,
    Running = 0x0000_0004,
    StopPending = 0x0000_0003,
    Stopped = 0x0000_0001,
}

impl ServiceState {
    pub fn from_raw(raw_state: u32) -> Result<Self, ParseRawError> {
        match raw_state {
            x if x == ServiceState::Stopped.to_raw() => Ok(ServiceState::Stopped),
            x if x == ServiceState::StartPending.to_raw() => Ok(ServiceState::StartPending),
            x if x == ServiceState::StopPending.to_raw() => Ok(ServiceState::StopPending),
            x if x == ServiceState::Running.to_raw() => Ok(ServiceState::Running),
            other => Err(ParseRawError::InvalidInteger(other)),
        }
    }

    pub fn to_raw(&self) -> u32 {
        *self as u32
    }

    /// Position of the state in the lifecycle. A run only ever moves to a higher stage.
    pub(crate) fn stage(&self) -> u8 {
        match self {
            ServiceState::StartPending => 0,
            ServiceState::Running => 1,
            ServiceState::StopPending => 2,
            ServiceState::Stopped => 3,
        }
    }

    /// Whether the system expects checkpoint progress while in this state.
    pub fn is_pending(&self) -> bool {
        matches!(self, ServiceState::StartPending | ServiceState::StopPending)
    }
}

/// Service exit code abstraction.
///
/// The service can either return a win32 error code or a custom error code. In case of custom
/// error, `dwWin32ExitCode` has to be set to `ERROR_SERVICE_SPECIFIC_ERROR` and the
/// `dwServiceSpecificExitCode` assigned with custom error code.
///
/// Refer to the corresponding MSDN article for more info:\
/// <https://msdn.microsoft.com/en-us/library/windows/desktop/ms685996(v=vs.85).aspx>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceExitCode {
    Win32(u32),
    ServiceSpecific(u32),
}

impl ServiceExitCode {
    /// A `ServiceExitCode` indicating success, no errors.
    pub const NO_ERROR: Self = ServiceExitCode::Win32(0);

    /// Returns the `(dwWin32ExitCode, dwServiceSpecificExitCode)` pair.
    pub fn to_raw(&self) -> (u32, u32) {
        match *self {
            ServiceExitCode::Win32(win32_error_code) => (win32_error_code, 0),
            ServiceExitCode::ServiceSpecific(service_error_code) => {
                (ERROR_SERVICE_SPECIFIC_ERROR, service_error_code)
            }
        }
    }

    pub fn from_raw(win32_exit_code: u32, service_specific_exit_code: u32) -> Self {
        if win32_exit_code == ERROR_SERVICE_SPECIFIC_ERROR {
            ServiceExitCode::ServiceSpecific(service_specific_exit_code)
        } else {
            ServiceExitCode::Win32(win32_exit_code)
        }
    }
}

impl Default for ServiceExitCode {
    fn default() -> Self {
        Self::NO_ERROR
    }
}

/// Service status.
///
/// Mirrors the lower level `SERVICE_STATUS`. Within a run it is only ever produced by the
/// [`StatusReporter`](crate::status_reporter::StatusReporter), which keeps `checkpoint` and
/// `wait_hint` consistent with `current_state`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceStatus {
    /// Current state of the service.
    pub current_state: ServiceState,

    /// Control commands that service accepts.
    pub controls_accepted: ServiceControlAccept,

    /// The error code the service uses to report an error that occurs when it is starting or
    /// stopping.
    pub exit_code: ServiceExitCode,

    /// Progress value that increases during lengthy pending operations.
    /// This value must be zero if the service does not have a pending start or stop operation.
    pub checkpoint: u32,

    /// Estimated time for pending operation.
    /// This basically works as a timeout until the system assumes that the service hung.
    pub wait_hint: Duration,
}

/// `dwWaitHint` value for `wait_hint`, saturating at `u32::MAX` milliseconds.
#[cfg_attr(not(windows), allow(dead_code))]
fn wait_hint_millis(wait_hint: Duration) -> u32 {
    u32::try_from(wait_hint.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(windows)]
impl ServiceStatus {
    pub(crate) fn to_raw(&self) -> windows_sys::Win32::System::Services::SERVICE_STATUS {
        let (win32_exit_code, service_specific_exit_code) = self.exit_code.to_raw();
        windows_sys::Win32::System::Services::SERVICE_STATUS {
            dwServiceType: SERVICE_WIN32_OWN_PROCESS,
            dwCurrentState: self.current_state.to_raw(),
            dwControlsAccepted: self.controls_accepted.bits(),
            dwWin32ExitCode: win32_exit_code,
            dwServiceSpecificExitCode: service_specific_exit_code,
            dwCheckPoint: self.checkpoint,
            dwWaitHint: wait_hint_millis(self.wait_hint),
        }
    }

    /// Tries to parse a `SERVICE_STATUS` into [`ServiceStatus`]. Accept flags this crate does
    /// not know about are dropped.
    pub(crate) fn from_raw(
        raw: &windows_sys::Win32::System::Services::SERVICE_STATUS,
    ) -> Result<Self, ParseRawError> {
        Ok(ServiceStatus {
            current_state: ServiceState::from_raw(raw.dwCurrentState)?,
            controls_accepted: ServiceControlAccept::from_bits_truncate(raw.dwControlsAccepted),
            exit_code: ServiceExitCode::from_raw(
                raw.dwWin32ExitCode,
                raw.dwServiceSpecificExitCode,
            ),
            checkpoint: raw.dwCheckPoint,
            wait_hint: Duration::from_millis(raw.dwWaitHint as u64),
        })
    }
}
