use anyhow::Result;
use monitor_service::{
    config::AppConfig,
    observability,
    store::{PgStorage, Storage},
};
use energy_core::domain::{Appliance, ApplianceStatus, UsageRecord};
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use std::env;
use time::{Duration, OffsetDateTime, Time};

const DEMO_USER: &str = "demo-user";
const SEED_DAYS: i64 = 30;

/// Seed a demo user with the stock appliances and 30 days of synthetic
/// usage, so dashboards, bills, and forecasts render something out of the
/// box. Skips seeding when the user already has appliances.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    let user_id = args.get(1).map(String::as_str).unwrap_or(DEMO_USER);

    let cfg = AppConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    let store = PgStorage::new(pool);

    if !store.appliances_for_user(user_id).await?.is_empty() {
        tracing::info!(user_id, "demo data already exists, nothing to do");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let specs = [
        ("Refrigerator", 200.0, "Kitchen"),
        ("Air Conditioner", 1500.0, "Bedroom"),
        ("Washing Machine", 500.0, "Laundry Room"),
    ];

    let mut appliances = Vec::new();
    for (name, power_rating, location) in specs {
        let appliance = Appliance {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            power_rating,
            location: location.to_string(),
            status: ApplianceStatus::Off,
            last_switched_on: None,
            created_at: now,
        };
        store.insert_appliance(&appliance).await?;
        appliances.push(appliance);
    }

    let mut rng = rand::thread_rng();
    let mut inserted: u64 = 0;

    for day_offset in 1..=SEED_DAYS {
        let day = now - Duration::days(day_offset);

        for appliance in &appliances {
            for (hour, minutes) in daily_schedule(&appliance.name, &mut rng) {
                let ts = day.replace_time(Time::from_hms(hour, 0, 0)?);
                let kwh = appliance.power_rating / 1000.0 * (minutes / 60.0);
                let record = UsageRecord {
                    user_id: user_id.to_string(),
                    appliance_id: appliance.id.clone(),
                    ts,
                    duration_minutes: Some(minutes),
                    power_consumed: kwh,
                };
                record.validate()?;
                store.insert_usage(&record).await?;
                inserted += 1;
            }
        }
    }

    tracing::info!(
        user_id,
        appliances = appliances.len(),
        usage_records = inserted,
        "demo data seeded"
    );

    Ok(())
}

/// Per-appliance run schedule for one day: (start hour, minutes running).
fn daily_schedule(name: &str, rng: &mut impl Rng) -> Vec<(u8, f64)> {
    match name {
        // Compressor duty-cycles around the clock.
        "Refrigerator" => (0..24)
            .step_by(3)
            .map(|hour| (hour, rng.gen_range(30.0..50.0)))
            .collect(),
        // Evening cooling.
        "Air Conditioner" => (19..=22)
            .map(|hour| (hour, rng.gen_range(35.0..60.0)))
            .collect(),
        // One morning load.
        "Washing Machine" => vec![(9, rng.gen_range(40.0..75.0))],
        _ => Vec::new(),
    }
}
