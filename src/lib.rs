// Copyright 2017 Amagicom AB.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A crate that hosts a single windows service: registration with the service control manager,
//! status reporting, control handling and a cancellable worker loop.
//!
//! # Implementing the service
//!
//! The work the service performs is described by a [`ServiceApplication`]. `serve` is called
//! repeatedly from a dedicated worker thread, paced by
//! [`ServiceOptions::pacing_interval`], until the service is asked to stop. `request_stop` is
//! called once from the control handler when the stop request arrives, before the worker loop
//! observes it.
//!
//! ```rust,no_run
//! use service_host::{ServeError, ServiceApplication, ServiceDescriptor};
//!
//! struct Heartbeat;
//!
//! impl ServiceApplication for Heartbeat {
//!     fn serve(&self) -> Result<(), ServeError> {
//!         log::info!("still alive");
//!         Ok(())
//!     }
//!
//!     fn request_stop(&self) {}
//! }
//!
//! # #[cfg(windows)]
//! fn main() {
//!     let descriptor = ServiceDescriptor::new("heartbeat", "Heartbeat service", Heartbeat);
//!     std::process::exit(service_host::windows::run(descriptor));
//! }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
//!
//! # Process entry
//!
//! The same executable installs, removes and runs the service. [`entry::run`] looks at the first
//! command line argument:
//!
//! * `-install` or `/install` registers the service to run the current executable.
//! * `-remove` or `/remove` stops the service if it is running and deletes it.
//! * Anything else connects the process to the service control dispatcher and blocks until the
//!   service is stopped.
//!
//! # Service lifecycle
//!
//! Once the system calls the service main function, the [`orchestrator`] registers a control
//! handler, reports [`StartPending`] and then [`Running`] and starts the worker loop. A stop
//! request moves the service to [`StopPending`]; the checkpoint keeps increasing while the
//! worker finishes its current iteration, and [`Stopped`] is reported once it has exited.
//!
//! Please refer to the "Service State Transitions" article on MSDN for more info:\
//! <https://msdn.microsoft.com/en-us/library/windows/desktop/ee126211(v=vs.85).aspx>
//!
//! [`StartPending`]: service::ServiceState::StartPending
//! [`Running`]: service::ServiceState::Running
//! [`StopPending`]: service::ServiceState::StopPending
//! [`Stopped`]: service::ServiceState::Stopped

mod error;
pub use crate::error::{Error, Result};

pub mod descriptor;
pub mod entry;
pub mod orchestrator;
pub mod registrar;
pub mod service;
pub mod service_control_handler;
pub mod service_dispatcher;
pub mod service_manager;
pub mod status_reporter;
pub mod stop_signal;
pub mod worker;

#[cfg(windows)]
pub mod windows;

#[cfg(test)]
mod mock;

pub use crate::descriptor::{
    Pacing, ServeError, ServiceApplication, ServiceDescriptor, ServiceOptions, StopPolling,
};
pub use crate::service_control_handler::ServiceControlHandlerResult;
