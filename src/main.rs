use log::{error, info};
use modem_gnss::{
    ApiResult, LocationConfiguration, LocationEngine, LocationPoint, LocationResults, SerialModem,
};
use std::env;
use std::process::ExitCode;

const DEFAULT_BAUD_RATE: u32 = 115_200;

const USAGE: &str = "usage: modem-gnss <port> [baud] [config.json]";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(port) = args.first() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };
    let baud_rate = match args.get(1).map(|b| b.parse::<u32>()) {
        None => DEFAULT_BAUD_RATE,
        Some(Ok(baud_rate)) => baud_rate,
        Some(Err(_)) => {
            eprintln!("invalid baud rate\n{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match run(port, baud_rate, args.get(2).map(String::as_str)) {
        Ok(LocationResults::Fixed) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Request one fix and print the location event
fn run(port: &str, baud_rate: u32, config_path: Option<&str>) -> ApiResult<LocationResults> {
    let config = match config_path {
        Some(path) => LocationConfiguration::from_file(path)?,
        None => LocationConfiguration::default(),
    };

    let modem = SerialModem::open(port, baud_rate)?;
    let engine = LocationEngine::new(Box::new(modem))?;
    engine.begin(config)?;
    info!("Modem type {:?}", engine.modem_type());

    let mut point = LocationPoint::default();
    let result = engine.get_location(&mut point, false);
    info!("Location result {:?}", result);
    if point.is_fixed() {
        info!("{}", point);
    }

    match engine.location_event(Some(&point)).to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Location event not serialized: {}", e),
    }
    Ok(result)
}
