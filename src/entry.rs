//! Process entry: dispatches the command line to install, remove or the service dispatcher.

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use log::error;

use crate::descriptor::{ServiceApplication, ServiceDescriptor};
use crate::orchestrator;
use crate::registrar::Registrar;
use crate::service_dispatcher::ServiceHost;
use crate::service_manager::ServiceControlManager;
use crate::Error;

/// What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `-install` or `/install`
    Install,
    /// `-remove` or `/remove`
    Remove,
    /// Anything else: hand the process over to the service control dispatcher.
    Run,
}

impl Command {
    /// Parse the process arguments, program name included. Only the first argument after the
    /// program name is looked at and flags are matched case-insensitively.
    pub fn from_args<I, S>(args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let first = match args.into_iter().nth(1) {
            Some(first) => first,
            None => return Command::Run,
        };
        let flag = match first.as_ref().to_str() {
            Some(flag) => flag,
            None => return Command::Run,
        };
        let name = match flag.strip_prefix('-').or_else(|| flag.strip_prefix('/')) {
            Some(name) => name,
            None => return Command::Run,
        };

        if name.eq_ignore_ascii_case("install") {
            Command::Install
        } else if name.eq_ignore_ascii_case("remove") {
            Command::Remove
        } else {
            Command::Run
        }
    }
}

/// Run the process and return its exit code.
///
/// Install and remove print a message describing the outcome and exit with 0 on success and 1
/// on failure. In service mode the process blocks until the service stops; the exit code is
/// the OS error code if the dispatcher could not be started, 0 otherwise. Failures of the
/// service run itself are only visible through the status reported to the system and the log.
pub fn run<A, M, H, I>(descriptor: ServiceDescriptor<A>, manager: M, host: H, args: I) -> i32
where
    A: ServiceApplication,
    M: ServiceControlManager,
    H: ServiceHost,
    I: IntoIterator<Item = OsString>,
{
    let name = descriptor.name.to_string_lossy().into_owned();
    match Command::from_args(args) {
        Command::Install => match Registrar::new(manager).install(&descriptor) {
            Ok(()) => {
                eprintln!("Service installed {}", name);
                0
            }
            Err(e) => {
                eprintln!("Failed to install service {}: {}", name, describe(&e));
                1
            }
        },
        Command::Remove => match Registrar::new(manager).uninstall(&descriptor) {
            Ok(()) => {
                eprintln!("Service removed {}", name);
                0
            }
            Err(e) => {
                eprintln!("Failed to remove service {}: {}", name, describe(&e));
                1
            }
        },
        Command::Run => dispatch(descriptor, host),
    }
}

fn dispatch<A: ServiceApplication, H: ServiceHost>(descriptor: ServiceDescriptor<A>, host: H) -> i32 {
    let descriptor = Arc::new(descriptor);
    let service_name = descriptor.name.clone();
    let service_host = host.clone();

    let result = host.start_dispatcher(&service_name, move |_arguments| {
        if let Err(e) = orchestrator::run_service(&descriptor, &service_host) {
            error!("Service run failed: {}", describe(&e));
        }
    });

    match result {
        Ok(()) => 0,
        Err(e) => {
            let error = Error::Dispatcher(e);
            error!("{}", describe(&error));
            error.raw_os_error().unwrap_or(1)
        }
    }
}

/// Formats an error together with its chain of sources.
fn describe(error: &Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
