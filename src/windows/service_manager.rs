use std::ffi::OsStr;
use std::{io, mem, ptr};

use widestring::{WideCString, WideString};
use windows_sys::Win32::System::Services;

use super::sc_handle::ScHandle;
use super::{double_nul_terminated, invalid_input, shell_escape, to_wide};
use crate::service::{
    ServiceAccess, ServiceControl, ServiceInfo, ServiceManagerAccess, ServiceStatus,
    SERVICE_WIN32_OWN_PROCESS,
};
use crate::service_manager::{ManagedService, ServiceControlManager, ServiceDatabase};

/// The services database of the local computer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalServiceManager;

impl ServiceControlManager for LocalServiceManager {
    type Connection = ServiceManager;

    fn connect(&self, request_access: ServiceManagerAccess) -> io::Result<ServiceManager> {
        ServiceManager::local_computer(request_access)
    }
}

/// Service manager.
pub struct ServiceManager {
    manager_handle: ScHandle,
}

impl ServiceManager {
    /// Connect to the active services database of the local computer.
    pub fn local_computer(request_access: ServiceManagerAccess) -> io::Result<Self> {
        let handle = unsafe {
            Services::OpenSCManagerW(ptr::null(), ptr::null(), request_access.bits())
        };

        if handle.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(ServiceManager {
                manager_handle: unsafe { ScHandle::new(handle) },
            })
        }
    }
}

impl ServiceDatabase for ServiceManager {
    type Service = Service;

    fn create_service(
        &self,
        service_info: &ServiceInfo,
        service_access: ServiceAccess,
    ) -> io::Result<Service> {
        let service_name = to_wide(&service_info.name)?;
        let display_name = to_wide(&service_info.display_name)?;
        let account_name = service_info.account_name.as_ref().map(to_wide).transpose()?;
        let account_password = service_info
            .account_password
            .as_ref()
            .map(to_wide)
            .transpose()?;

        // escape executable path and arguments and combine them into single command
        let mut launch_command_buffer = WideString::new();
        launch_command_buffer.push_os_str(shell_escape::escape(
            service_info.executable_path.as_os_str(),
        ));
        for launch_argument in service_info.launch_arguments.iter() {
            launch_command_buffer.push_str(" ");
            launch_command_buffer.push_os_str(shell_escape::escape(launch_argument));
        }
        let launch_command =
            WideCString::from_ustr(launch_command_buffer).map_err(invalid_input)?;

        let dependency_identifiers: Vec<_> = service_info
            .dependencies
            .iter()
            .map(|dependency| dependency.to_system_identifier())
            .collect();
        let joined_dependencies =
            double_nul_terminated::from_vec(&dependency_identifiers).map_err(invalid_input)?;

        let service_handle = unsafe {
            Services::CreateServiceW(
                self.manager_handle.raw_handle(),
                service_name.as_ptr(),
                display_name.as_ptr(),
                service_access.bits(),
                SERVICE_WIN32_OWN_PROCESS,
                service_info.start_type.to_raw(),
                service_info.error_control.to_raw(),
                launch_command.as_ptr(),
                ptr::null(),     // load ordering group
                ptr::null_mut(), // tag id within the load ordering group
                joined_dependencies
                    .as_ref()
                    .map_or(ptr::null(), |s| s.as_ptr()),
                account_name.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                account_password
                    .as_ref()
                    .map_or(ptr::null(), |s| s.as_ptr()),
            )
        };

        if service_handle.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(Service::new(unsafe { ScHandle::new(service_handle) }))
        }
    }

    fn open_service(&self, name: &OsStr, request_access: ServiceAccess) -> io::Result<Service> {
        let service_name = to_wide(name)?;
        let service_handle = unsafe {
            Services::OpenServiceW(
                self.manager_handle.raw_handle(),
                service_name.as_ptr(),
                request_access.bits(),
            )
        };

        if service_handle.is_null() {
            Err(io::Error::last_os_error())
        } else {
            Ok(Service::new(unsafe { ScHandle::new(service_handle) }))
        }
    }
}

/// A handle to an installed service.
pub struct Service {
    service_handle: ScHandle,
}

impl Service {
    fn new(service_handle: ScHandle) -> Self {
        Service { service_handle }
    }

    fn send_control_command(&self, command: ServiceControl) -> io::Result<ServiceStatus> {
        let mut raw_status: Services::SERVICE_STATUS = unsafe { mem::zeroed() };
        let success = unsafe {
            Services::ControlService(
                self.service_handle.raw_handle(),
                command.to_raw(),
                &mut raw_status,
            )
        };

        if success == 0 {
            Err(io::Error::last_os_error())
        } else {
            parse_status(&raw_status)
        }
    }
}

impl ManagedService for Service {
    fn query_status(&self) -> io::Result<ServiceStatus> {
        let mut raw_status: Services::SERVICE_STATUS = unsafe { mem::zeroed() };
        let success = unsafe {
            Services::QueryServiceStatus(self.service_handle.raw_handle(), &mut raw_status)
        };

        if success == 0 {
            Err(io::Error::last_os_error())
        } else {
            parse_status(&raw_status)
        }
    }

    fn stop(&self) -> io::Result<ServiceStatus> {
        self.send_control_command(ServiceControl::Stop)
    }

    fn delete(self) -> io::Result<()> {
        let success = unsafe { Services::DeleteService(self.service_handle.raw_handle()) };
        if success == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn parse_status(raw_status: &Services::SERVICE_STATUS) -> io::Result<ServiceStatus> {
    ServiceStatus::from_raw(raw_status).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
