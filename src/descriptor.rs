use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::service::{ServiceDependency, ServiceErrorControl, ServiceInfo, ServiceStartType};

/// Error type returned by [`ServiceApplication::serve`].
pub type ServeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The application hosted by the service.
///
/// `serve` performs one bounded unit of work and is called repeatedly from the worker thread.
/// `request_stop` is invoked from the service control thread, once, when a stop request is
/// accepted. It should flip whatever internal flag makes an in-flight `serve` return early.
pub trait ServiceApplication: Send + Sync + 'static {
    fn serve(&self) -> Result<(), ServeError>;

    fn request_stop(&self);
}

/// How the worker loop waits between two `serve` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pacing {
    /// Wait on the stop signal with the pacing interval as timeout. A stop request ends the
    /// wait immediately.
    Interruptible,
    /// Sleep for the whole pacing interval regardless of stop requests.
    Fixed,
}

/// Polling policy used while waiting for a service to stop during uninstall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopPolling {
    /// Delay between two status queries.
    pub interval: Duration,

    /// Number of waits after which a service still in `StopPending` is considered stuck.
    pub max_attempts: u32,
}

impl Default for StopPolling {
    fn default() -> Self {
        StopPolling {
            interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}

/// Runtime tuning of the hosted service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceOptions {
    /// Delay between two iterations of the worker loop.
    pub pacing_interval: Duration,

    /// How the delay between iterations is spent.
    pub pacing: Pacing,

    /// Wait hint sent along with pending states. The system presumes the service hung if
    /// neither the state nor the checkpoint changes within this time.
    pub wait_hint: Duration,

    /// Used by uninstall when the service has to be stopped first.
    pub stop_polling: StopPolling,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        ServiceOptions {
            pacing_interval: Duration::from_secs(3),
            pacing: Pacing::Interruptible,
            wait_hint: Duration::from_secs(10),
            stop_polling: StopPolling::default(),
        }
    }
}

/// Everything needed to install, remove and run a service.
///
/// Built once at process startup and never mutated afterwards.
pub struct ServiceDescriptor<A> {
    /// Service name
    pub name: OsString,

    /// User-friendly service name
    pub display_name: OsString,

    /// The service startup options
    pub start_type: ServiceStartType,

    /// The severity of the error, and action taken, if this service fails to start.
    pub error_control: ServiceErrorControl,

    /// Service dependencies
    pub dependencies: Vec<ServiceDependency>,

    /// Account to use for running the service. `None` runs as LocalSystem.
    pub account_name: Option<OsString>,

    /// Account password.
    pub account_password: Option<OsString>,

    /// Arguments appended to the executable path in the registered launch command.
    pub launch_arguments: Vec<OsString>,

    pub options: ServiceOptions,

    /// The hosted application.
    pub application: Arc<A>,
}

impl<A: ServiceApplication> ServiceDescriptor<A> {
    /// Creates a demand-start descriptor running as LocalSystem with no dependencies.
    pub fn new(
        name: impl Into<OsString>,
        display_name: impl Into<OsString>,
        application: A,
    ) -> Self {
        ServiceDescriptor {
            name: name.into(),
            display_name: display_name.into(),
            start_type: ServiceStartType::OnDemand,
            error_control: ServiceErrorControl::Normal,
            dependencies: vec![],
            account_name: None,
            account_password: None,
            launch_arguments: vec![],
            options: ServiceOptions::default(),
            application: Arc::new(application),
        }
    }

    /// Produces the registry entry for this service bound to `executable_path`.
    pub fn service_info(&self, executable_path: PathBuf) -> ServiceInfo {
        ServiceInfo {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            start_type: self.start_type,
            error_control: self.error_control,
            executable_path,
            launch_arguments: self.launch_arguments.clone(),
            dependencies: self.dependencies.clone(),
            account_name: self.account_name.clone(),
            account_password: self.account_password.clone(),
        }
    }
}
