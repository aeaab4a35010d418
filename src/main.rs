use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use roomslot::assistant;
use roomslot::config::{BookingConfig, StoreConfig};
use roomslot::engine::{AvailabilityChecker, validate_request};
use roomslot::model::{BookingRequest, parse_date, parse_time};
use roomslot::store::RestStore;

const USAGE: &str = "usage: roomslot <room-id> <YYYY-MM-DD> <HH:mm> <HH:mm>";

#[tokio::main]
async fn main() -> ExitCode {
    roomslot::observability::init_tracing();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the requested slot is free.
async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [room, date, start, end] = args.as_slice() else {
        return Err(USAGE.into());
    };
    let date = parse_date(date).ok_or_else(|| format!("invalid date: {date}"))?;
    let start = parse_time(start).ok_or_else(|| format!("invalid start time: {start}"))?;
    let end = parse_time(end).ok_or_else(|| format!("invalid end time: {end}"))?;

    let booking = BookingConfig::from_env();
    let store_config = StoreConfig::from_env()?;
    info!(url = %store_config.base_url, table = %store_config.reservations_table, "roomslot checking availability");

    let checker = AvailabilityChecker::new(Arc::new(RestStore::new(store_config)?), booking);
    let room = assistant::resolve_room(&checker, room).await?;
    let request = BookingRequest {
        room_id: room.id.clone(),
        date,
        start,
        end,
    };
    validate_request(&request, checker.now(), checker.config())?;

    let report = assistant::check_availability(&checker, &room, date, start, end).await?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(report.available)
}
