//! Scan for a vehicle's tire sensors and print live readings.
//!
//! Run with: cargo run --example tire_monitor -- "3 Axles" metric

use smarttire_ble::data::TireStatus;
use smarttire_ble::store::accessors;
use smarttire_ble::{
    format_pressure, format_temperature, AppState, Result, Store, TireSensorManager,
    UnitSystem, Vehicle,
};

const VEHICLE_ID: &str = "main-vehicle";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("smarttire_ble=info".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let axle_type = args.next().unwrap_or_else(|| "2 Axles".to_string());
    let units = match args.next().as_deref() {
        Some("metric") => UnitSystem::Metric,
        _ => UnitSystem::Imperial,
    };

    let vehicle = Vehicle::new(VEHICLE_ID, "My Rig", axle_type.as_str(), "Power Unit");
    let positions = vehicle.expected_positions();

    let store = Store::spawn_with(AppState {
        vehicles: vec![vehicle],
        selected_vehicle_id: Some(VEHICLE_ID.to_string()),
        units,
        ..Default::default()
    });
    let handle = store.handle();

    let manager = TireSensorManager::new().await?;
    manager.set_store(handle.clone());
    manager.initialize().await?;

    println!(
        "Scanning for {} tire sensors ({})...\n",
        positions.len(),
        axle_type
    );

    let _found_handle = manager.on_sensor_found(|sensor| {
        println!("  Found {} -> {}", sensor.name(), sensor.tire_id);
    });

    let found = manager.scan_for_sensors(VEHICLE_ID, &positions).await?;
    if found.is_empty() {
        println!("No tire sensors found.");
        manager.cleanup().await;
        store.shutdown().await;
        return Ok(());
    }

    manager
        .subscribe_to_vehicle_sensors(VEHICLE_ID, |_| {})
        .await;
    println!(
        "\nSubscribed to {} sensors. Press Ctrl+C to stop.\n",
        manager.connected_sensors(Some(VEHICLE_ID)).len()
    );

    let mut state_rx = handle.subscribe();
    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                print_vehicle(&state);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    manager.cleanup().await;
    store.shutdown().await;
    Ok(())
}

fn print_vehicle(state: &AppState) {
    let Some(vehicle) = accessors::selected_vehicle(state) else {
        return;
    };

    println!("{} ({})", vehicle.name, vehicle.axle_type);
    for tire in vehicle.expected_positions() {
        match accessors::tire_data(state, Some(&vehicle.id), &tire) {
            Some(sample) => {
                let status = vehicle.tire_status(&tire).unwrap_or(TireStatus::Normal);
                println!(
                    "  {:<18} {:>10} {:>8}  {}",
                    tire,
                    format_pressure(sample.psi, state.units),
                    format_temperature(sample.temp, state.units),
                    status
                );
            }
            None => println!("  {:<18} {:>10}", tire, "--"),
        }
    }
    println!();
}
