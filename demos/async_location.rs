//! Asynchronous acquisition against a scripted modem
//!
//! Runs a BG95 mock through two settling fixes and prints the location event
//! from a completion callback dispatched on the main thread.

use modem_gnss::hardware::{MockGpio, MockModem};
use modem_gnss::{Constellation, LocationConfiguration, LocationEngine, LocationResults};
use std::sync::mpsc;
use std::time::Duration;

const FIX: &str =
    "+QGPSLOC: 061951.000,41.02044,-75.17022,1.3,285.9,3,090.30,7.2,3.9,110324,08";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("=== Modem GNSS - Async Location Demo ===\n");

    let modem = MockModem::new("BG95-M5");
    modem.push_location_response("+CME ERROR: 516");
    modem.push_location_response(FIX);
    modem.push_location_response(FIX);
    modem.set_accuracy_response("+QGPSCFG: \"estimation_error\",3.2,5.1,0.4,12.0");

    let engine = LocationEngine::with_gpio(Box::new(modem.clone()), Box::new(MockGpio::new()))?;
    engine.begin(
        LocationConfiguration::new()
            .with_constellation(Constellation::GpsGalileo)
            .with_maximum_fix_time(10)
            .with_poll_interval(Duration::from_millis(100)),
    )?;
    println!("Detected modem: {:?}", engine.modem_type());
    println!(
        "Concurrent GNSS and cellular: {}",
        engine.concurrent_gnss_and_cellular_supported()
    );

    let (done_tx, done_rx) = mpsc::channel();
    let result = engine.get_location_async(move |result, point| {
        println!("Callback: {:?} {}", result, point);
        let _ = done_tx.send(result);
    });
    println!("Request: {:?}", result);
    if result != LocationResults::Acquiring {
        return Ok(());
    }

    while !engine.await_completion(Duration::from_secs(1)) {
        println!("Status: {:?}", engine.get_status());
    }

    if done_rx.try_recv()? == LocationResults::Fixed {
        let point = engine.last_location_point();
        println!("Event: {}", engine.location_event(Some(&point)).to_json()?);
    }
    println!("Position queries sent: {}", modem.location_queries());

    engine.shutdown();
    println!("\nAsync location demo completed successfully!");
    Ok(())
}
