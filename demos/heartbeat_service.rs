// Heartbeat service example.
//
// All commands mentioned below shall be executed in Command Prompt with Administrator privileges.
//
// Service installation: `heartbeat_service.exe -install`
// Service removal: `heartbeat_service.exe -remove`
//
// Start the service: `net start heartbeat_service`
// Stop the service: `net stop heartbeat_service`
//
// The service logs a heartbeat every few seconds. Set `RUST_LOG=info` in the service environment
// to see them.

#[cfg(windows)]
fn main() {
    std::process::exit(heartbeat_service::run());
}

#[cfg(not(windows))]
fn main() {
    panic!("This program is only intended to run on Windows.");
}

#[cfg(windows)]
mod heartbeat_service {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    use service_host::{ServeError, ServiceApplication, ServiceDescriptor};

    const SERVICE_NAME: &str = "heartbeat_service";
    const SERVICE_DISPLAY_NAME: &str = "Heartbeat service";

    #[derive(Default)]
    struct Heartbeat {
        beats: AtomicU64,
        stopping: AtomicBool,
    }

    impl ServiceApplication for Heartbeat {
        fn serve(&self) -> Result<(), ServeError> {
            if self.stopping.load(Ordering::SeqCst) {
                return Ok(());
            }
            let beat = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!("Heartbeat #{}", beat);
            Ok(())
        }

        fn request_stop(&self) {
            self.stopping.store(true, Ordering::SeqCst);
            log::info!(
                "Stop requested after {} heartbeats",
                self.beats.load(Ordering::SeqCst)
            );
        }
    }

    pub fn run() -> i32 {
        env_logger::init();

        let mut descriptor =
            ServiceDescriptor::new(SERVICE_NAME, SERVICE_DISPLAY_NAME, Heartbeat::default());
        descriptor.options.pacing_interval = Duration::from_secs(5);

        service_host::windows::run(descriptor)
    }
}
