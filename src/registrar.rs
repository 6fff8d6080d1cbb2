use std::env;
use std::thread;

use log::{debug, info, warn};

use crate::descriptor::{ServiceApplication, ServiceDescriptor, StopPolling};
use crate::service::{ServiceAccess, ServiceManagerAccess, ServiceState};
use crate::service_manager::{ManagedService, ServiceControlManager, ServiceDatabase};
use crate::{Error, Result};

/// `ERROR_SERVICE_NOT_ACTIVE`, returned by a stop request sent to a service that isn't running.
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;

/// Installs and removes a service entry in the services database.
pub struct Registrar<M> {
    manager: M,
}

impl<M: ServiceControlManager> Registrar<M> {
    pub fn new(manager: M) -> Self {
        Registrar { manager }
    }

    /// Register the current executable as the service described by `descriptor`.
    pub fn install<A: ServiceApplication>(&self, descriptor: &ServiceDescriptor<A>) -> Result<()> {
        let executable_path = env::current_exe().map_err(Error::ExecutablePath)?;

        let connection = self
            .manager
            .connect(ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE)
            .map_err(Error::ConnectDatabase)?;

        let service_info = descriptor.service_info(executable_path);
        let _service = connection
            .create_service(&service_info, ServiceAccess::QUERY_STATUS)
            .map_err(Error::CreateService)?;

        info!(
            "Installed service {} ({})",
            service_info.name.to_string_lossy(),
            service_info.executable_path.display()
        );
        Ok(())
    }

    /// Stop the service if needed and remove it from the services database.
    pub fn uninstall<A: ServiceApplication>(
        &self,
        descriptor: &ServiceDescriptor<A>,
    ) -> Result<()> {
        let connection = self
            .manager
            .connect(ServiceManagerAccess::CONNECT)
            .map_err(Error::ConnectDatabase)?;

        let service_access =
            ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE;
        let service = connection
            .open_service(&descriptor.name, service_access)
            .map_err(Error::OpenService)?;

        let polling = descriptor.options.stop_polling;
        match service.query_status().map_err(Error::QueryStatus)?.current_state {
            ServiceState::Running => {
                request_stop(&service)?;
                wait_for_stop(&service, polling)?;
            }
            // A stop is already under way and a second stop control would be rejected.
            ServiceState::StopPending => wait_for_stop(&service, polling)?,
            ServiceState::StartPending | ServiceState::Stopped => (),
        }

        service.delete().map_err(Error::DeleteFailed)?;
        info!("Removed service {}", descriptor.name.to_string_lossy());
        Ok(())
    }
}

fn request_stop<S: ManagedService>(service: &S) -> Result<()> {
    match service.stop() {
        Ok(_) => Ok(()),
        Err(e) if e.raw_os_error() == Some(ERROR_SERVICE_NOT_ACTIVE) => {
            debug!("Service stopped before the stop request arrived");
            Ok(())
        }
        Err(e) => Err(Error::StopService(e)),
    }
}

/// Poll until the service leaves `StopPending`.
fn wait_for_stop<S: ManagedService>(service: &S, polling: StopPolling) -> Result<()> {
    let mut attempts = 0;
    let final_state = loop {
        let state = service.query_status().map_err(Error::QueryStatus)?.current_state;
        if state != ServiceState::StopPending {
            break state;
        }
        if attempts == polling.max_attempts {
            break state;
        }
        attempts += 1;
        debug!("Waiting for the service to stop ({}/{})", attempts, polling.max_attempts);
        thread::sleep(polling.interval);
    };

    if final_state == ServiceState::Stopped {
        Ok(())
    } else {
        warn!("Service did not stop, last state {:?}", final_state);
        Err(Error::StopTimeout(final_state))
    }
}
