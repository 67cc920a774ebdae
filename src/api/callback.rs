//! Asynchronous location requests
//!
//! Completed acquisitions are queued on the engine's completion channel.
//! Callbacks run on whichever thread calls [`LocationEngine::dispatch_completions`]
//! or [`LocationEngine::await_completion`], never on the worker thread.

use crate::api::engine::LocationEngine;
use crate::api::types::{LocationCommandContext, LocationCompletion, LocationResults};
use crate::core::LocationPoint;
use log::trace;
use std::sync::PoisonError;
use std::time::Duration;

impl LocationEngine {
    /// Start an acquisition without blocking
    ///
    /// Returns `Acquiring` when the request was accepted, else the preflight
    /// result; a rejected callback is dropped without being called.
    pub fn get_location_async<F>(&self, callback: F) -> LocationResults
    where
        F: FnOnce(LocationResults, &LocationPoint) + Send + 'static,
    {
        if let Some(rejected) = self.preflight() {
            return rejected;
        }

        match self.submit(LocationCommandContext::acquire_async(Box::new(callback))) {
            Ok(()) => LocationResults::Acquiring,
            Err(rejected) => rejected,
        }
    }

    /// Run the callbacks of all completed asynchronous requests
    ///
    /// Returns the number of callbacks run.
    pub fn dispatch_completions(&self) -> usize {
        let ready: Vec<LocationCompletion> = {
            let completions = self.completions.lock().unwrap_or_else(PoisonError::into_inner);
            completions.try_iter().collect()
        };

        let count = ready.len();
        for completion in ready {
            run_completion(completion);
        }
        count
    }

    /// Wait up to `timeout` for one completion and run its callback
    pub fn await_completion(&self, timeout: Duration) -> bool {
        let completion = {
            let completions = self.completions.lock().unwrap_or_else(PoisonError::into_inner);
            completions.recv_timeout(timeout)
        };

        match completion {
            Ok(completion) => {
                run_completion(completion);
                true
            }
            Err(_) => false,
        }
    }
}

fn run_completion(completion: LocationCompletion) {
    trace!("Dispatching location completion {:?}", completion.result);
    (completion.callback)(completion.result, &completion.point);
}

#[cfg(test)]
mod tests {
    use crate::api::engine::tests::{fast_config, test_engine, FIX};
    use crate::api::LocationResults;
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_async_fix_runs_callback_on_dispatch() {
        let (modem, _gpio, engine) = test_engine("EG91-NAX");
        engine.begin(fast_config()).unwrap();
        modem.push_location_response(FIX);
        modem.push_location_response(FIX);

        let (seen_tx, seen_rx) = mpsc::channel();
        let result = engine.get_location_async(move |result, point| {
            seen_tx.send((result, point.latitude)).unwrap();
        });
        assert_eq!(result, LocationResults::Acquiring);
        assert!(seen_rx.try_recv().is_err());

        assert!(engine.await_completion(WAIT));
        assert_eq!(seen_rx.try_recv().unwrap(), (LocationResults::Fixed, 41.02044));
        assert_eq!(engine.last_results(), LocationResults::Fixed);
        assert_eq!(engine.dispatch_completions(), 0);
    }

    #[test]
    fn test_dispatch_drains_completed_requests() {
        let (_modem, _gpio, engine) = test_engine("BG95-M5");
        engine
            .begin(fast_config().with_maximum_fix_time_millis(50))
            .unwrap();

        let (seen_tx, seen_rx) = mpsc::channel();
        assert_eq!(
            engine.get_location_async(move |result, _| seen_tx.send(result).unwrap()),
            LocationResults::Acquiring
        );

        let started = std::time::Instant::now();
        while engine.get_status() == LocationResults::Acquiring {
            assert!(started.elapsed() < WAIT);
            std::thread::sleep(Duration::from_millis(5));
        }
        // Completion is posted right after the flag clears
        let mut dispatched = 0;
        while dispatched == 0 {
            assert!(started.elapsed() < WAIT);
            dispatched = engine.dispatch_completions();
        }

        assert_eq!(dispatched, 1);
        assert_eq!(seen_rx.try_recv().unwrap(), LocationResults::TimedOut);
    }

    #[test]
    fn test_rejected_request_drops_callback() {
        let (modem, _gpio, engine) = test_engine("EG91-EX");
        modem.set_powered(false);
        engine.begin(fast_config()).unwrap();

        let (seen_tx, seen_rx) = mpsc::channel::<LocationResults>();
        let result = engine.get_location_async(move |result, _| seen_tx.send(result).unwrap());

        assert_eq!(result, LocationResults::Unavailable);
        assert!(matches!(seen_rx.recv_timeout(WAIT), Err(mpsc::RecvTimeoutError::Disconnected)));
        assert!(!engine.await_completion(Duration::from_millis(10)));
    }
}
