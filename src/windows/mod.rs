//! The system side of the host: the service control manager of the local computer and the
//! service control dispatcher.

use std::env;
use std::error::Error as StdError;
use std::ffi::OsStr;
use std::io;

use widestring::WideCString;

use crate::descriptor::{ServiceApplication, ServiceDescriptor};
use crate::entry;

mod double_nul_terminated;
mod sc_handle;
mod service_host;
mod service_manager;
mod shell_escape;

pub use self::service_host::{ServiceStatusHandle, WindowsServiceHost};
pub use self::service_manager::{LocalServiceManager, Service, ServiceManager};

/// Run the process against the local service control manager with the process arguments.
///
/// Returns the process exit code, see [`entry::run`].
pub fn run<A: ServiceApplication>(descriptor: ServiceDescriptor<A>) -> i32 {
    entry::run(
        descriptor,
        LocalServiceManager,
        WindowsServiceHost,
        env::args_os(),
    )
}

fn to_wide(s: impl AsRef<OsStr>) -> io::Result<WideCString> {
    WideCString::from_os_str(s).map_err(invalid_input)
}

fn invalid_input(error: impl Into<Box<dyn StdError + Send + Sync>>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error)
}
