use std::thread;
use std::time::Duration;

use log::{debug, error};

use crate::descriptor::{Pacing, ServeError, ServiceApplication};
use crate::stop_signal::StopSignal;

/// Call `serve` until the stop signal is observed.
///
/// The signal is polled before every iteration. An in-flight `serve` is never interrupted, so a
/// stop request arriving mid-iteration lets that iteration finish and nothing more. Errors from
/// `serve` end the loop and are returned as-is.
pub fn run<A: ServiceApplication + ?Sized>(
    application: &A,
    stop_signal: &StopSignal,
    interval: Duration,
    pacing: Pacing,
) -> Result<(), ServeError> {
    let mut iterations: u64 = 0;
    while !stop_signal.is_set() {
        if let Err(e) = application.serve() {
            error!("Service work failed after {} iterations: {}", iterations, e);
            return Err(e);
        }
        iterations += 1;

        match pacing {
            Pacing::Interruptible => {
                stop_signal.wait_timeout(interval);
            }
            Pacing::Fixed => thread::sleep(interval),
        }
    }

    debug!("Worker loop finished after {} iterations", iterations);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::mock::MockApplication;

    /// Sets the stop signal from inside the n-th `serve` call.
    struct StopDuringServe {
        stop_signal: StopSignal,
        stop_at: usize,
        calls: AtomicUsize,
    }

    impl ServiceApplication for StopDuringServe {
        fn serve(&self) -> Result<(), ServeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.stop_at {
                self.stop_signal.set();
            }
            Ok(())
        }

        fn request_stop(&self) {}
    }

    #[test]
    fn test_preset_signal_skips_serve() {
        let application = MockApplication::default();
        let stop_signal = StopSignal::new();
        stop_signal.set();

        run(&application, &stop_signal, Duration::ZERO, Pacing::Fixed).unwrap();

        assert_eq!(application.serve_calls(), 0);
    }

    #[test]
    fn test_signal_during_serve_bounds_overrun() {
        for pacing in [Pacing::Interruptible, Pacing::Fixed] {
            for stop_at in 1..4 {
                let stop_signal = StopSignal::new();
                let application = StopDuringServe {
                    stop_signal: stop_signal.clone(),
                    stop_at,
                    calls: AtomicUsize::new(0),
                };

                run(&application, &stop_signal, Duration::from_millis(1), pacing).unwrap();

                assert_eq!(application.calls.load(Ordering::SeqCst), stop_at);
            }
        }
    }

    #[test]
    fn test_interruptible_pacing_ends_wait_early() {
        let application = MockApplication::default();
        let stop_signal = StopSignal::new();
        let setter = {
            let stop_signal = stop_signal.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                stop_signal.set();
            })
        };

        let started = Instant::now();
        run(
            &application,
            &stop_signal,
            Duration::from_secs(60),
            Pacing::Interruptible,
        )
        .unwrap();
        setter.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(application.serve_calls(), 1);
    }

    #[test]
    fn test_serve_error_is_propagated() {
        let application = MockApplication::default();
        application.fail_on_call(3, io::Error::new(io::ErrorKind::Other, "disk full"));
        let stop_signal = StopSignal::new();

        let error = run(&application, &stop_signal, Duration::ZERO, Pacing::Fixed).unwrap_err();

        assert_eq!(error.to_string(), "disk full");
        assert_eq!(application.serve_calls(), 3);
    }
}
