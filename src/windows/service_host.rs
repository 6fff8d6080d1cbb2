use std::ffi::{OsStr, OsString};
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::{io, ptr};

use log::error;
use widestring::WideCStr;
use windows_sys::core::PWSTR;
use windows_sys::Win32::System::Services;

use super::to_wide;
use crate::service::{ServiceControl, ServiceStatus};
use crate::service_control_handler::ServiceControlHandlerResult;
use crate::service_dispatcher::ServiceHost;
use crate::status_reporter::StatusHandle;

type ServiceMain = Box<dyn FnOnce(Vec<OsString>) + Send>;

/// The service main function waiting to be called by the dispatcher.
///
/// The system calls the service main function without any context pointer, so the closure
/// passed to [`WindowsServiceHost::start_dispatcher`] is parked here until then.
static SERVICE_MAIN: Mutex<Option<ServiceMain>> = Mutex::new(None);

/// A struct that holds a unique token for updating the status of the corresponding service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceStatusHandle(Services::SERVICE_STATUS_HANDLE);

// Underlying SERVICE_STATUS_HANDLE is thread safe.
// See remarks section for more info:
// https://msdn.microsoft.com/en-us/library/windows/desktop/ms686241(v=vs.85).aspx
unsafe impl Send for ServiceStatusHandle {}
unsafe impl Sync for ServiceStatusHandle {}

impl StatusHandle for ServiceStatusHandle {
    fn set_service_status(&self, service_status: &ServiceStatus) -> io::Result<()> {
        let raw_service_status = service_status.to_raw();
        let result = unsafe { Services::SetServiceStatus(self.0, &raw_service_status) };
        if result == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// Connects the process to the service control manager of the local computer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsServiceHost;

impl ServiceHost for WindowsServiceHost {
    type StatusHandle = ServiceStatusHandle;

    fn register_control_handler<F>(
        &self,
        service_name: &OsStr,
        event_handler: F,
    ) -> io::Result<ServiceStatusHandle>
    where
        F: FnMut(ServiceControl) -> ServiceControlHandlerResult + Send + 'static,
    {
        let service_name = to_wide(service_name)?;

        // The handler stays alive for the rest of the process. The system may deliver controls
        // until the process exits, including after the service reported `Stopped`.
        let context: *mut F = Box::into_raw(Box::new(event_handler));

        let status_handle = unsafe {
            Services::RegisterServiceCtrlHandlerExW(
                service_name.as_ptr(),
                Some(service_control_handler::<F>),
                context as *const c_void,
            )
        };

        if status_handle.is_null() {
            let error = io::Error::last_os_error();
            // Release the `event_handler` in case of an error.
            let _: Box<F> = unsafe { Box::from_raw(context) };
            Err(error)
        } else {
            Ok(ServiceStatusHandle(status_handle))
        }
    }

    fn start_dispatcher<F>(&self, service_name: &OsStr, service_main: F) -> io::Result<()>
    where
        F: FnOnce(Vec<OsString>) + Send + 'static,
    {
        let service_name = to_wide(service_name)?;
        {
            let mut slot = SERVICE_MAIN.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "the service control dispatcher is already running",
                ));
            }
            *slot = Some(Box::new(service_main));
        }

        let service_table: &[Services::SERVICE_TABLE_ENTRYW] = &[
            Services::SERVICE_TABLE_ENTRYW {
                lpServiceName: service_name.as_ptr() as _,
                lpServiceProc: Some(ffi_service_main),
            },
            // the last item has to be { null, null }
            Services::SERVICE_TABLE_ENTRYW {
                lpServiceName: ptr::null_mut(),
                lpServiceProc: None,
            },
        ];

        let result = unsafe { Services::StartServiceCtrlDispatcherW(service_table.as_ptr()) };
        let outcome = if result == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        };

        // Not taken if the system never called the service main function.
        SERVICE_MAIN
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        outcome
    }
}

/// Static callback used by the system to bootstrap the service.
unsafe extern "system" fn ffi_service_main(
    num_service_arguments: u32,
    service_arguments: *mut PWSTR,
) {
    let arguments = parse_service_arguments(num_service_arguments, service_arguments);
    let service_main = SERVICE_MAIN
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();

    if let Some(service_main) = service_main {
        // Unwinding into the system dispatcher would abort the process.
        if panic::catch_unwind(AssertUnwindSafe(|| service_main(arguments))).is_err() {
            error!("The service main function panicked");
        }
    }
}

/// Static service control handler
unsafe extern "system" fn service_control_handler<F>(
    control: u32,
    _event_type: u32,
    _event_data: *mut c_void,
    context: *mut c_void,
) -> u32
where
    F: FnMut(ServiceControl) -> ServiceControlHandlerResult,
{
    // Important: cast context to &mut F without taking ownership.
    let event_handler: &mut F = &mut *(context as *mut F);

    match ServiceControl::from_raw(control) {
        Ok(service_control) => event_handler(service_control).to_raw(),
        // Report all unknown control commands as unimplemented
        Err(_) => ServiceControlHandlerResult::NotImplemented.to_raw(),
    }
}

/// Parse raw arguments received in `service_main` into `Vec<OsString>`.
unsafe fn parse_service_arguments(argc: u32, argv: *mut PWSTR) -> Vec<OsString> {
    if argv.is_null() {
        return Vec::new();
    }
    (0..argc as usize)
        .map(|i| {
            let array_element_ptr: *mut PWSTR = argv.add(i);
            WideCStr::from_ptr_str(*array_element_ptr).to_os_string()
        })
        .collect()
}
