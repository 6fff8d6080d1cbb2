//! The service control manager as seen by the registrar.
//!
//! Handles returned by these traits own the underlying system handle and release it when
//! dropped, so every exit path of an operation closes what it opened.

use std::ffi::OsStr;
use std::io;

use crate::service::{ServiceAccess, ServiceInfo, ServiceManagerAccess, ServiceStatus};

/// Entry point to a services database.
pub trait ServiceControlManager {
    type Connection: ServiceDatabase;

    /// Connect to the services database with the requested access.
    fn connect(&self, request_access: ServiceManagerAccess) -> io::Result<Self::Connection>;
}

/// An open connection to a services database.
pub trait ServiceDatabase {
    type Service: ManagedService;

    /// Create a service entry and return a handle to it with `service_access` permissions.
    fn create_service(
        &self,
        service_info: &ServiceInfo,
        service_access: ServiceAccess,
    ) -> io::Result<Self::Service>;

    /// Open an existing service entry.
    fn open_service(&self, name: &OsStr, request_access: ServiceAccess)
        -> io::Result<Self::Service>;
}

/// A handle to a single service entry.
pub trait ManagedService {
    /// Get the service status from the system.
    fn query_status(&self) -> io::Result<ServiceStatus>;

    /// Send the stop control and return the status reported right after.
    fn stop(&self) -> io::Result<ServiceStatus>;

    /// Mark the service for deletion from the system registry.
    fn delete(self) -> io::Result<()>;
}
