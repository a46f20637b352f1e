/// Database operations for storing and querying callback readings
use tokio_postgres::Row;

use crate::database::connection::{execute_with_retry, RetryPolicy};
use crate::models::{NewReading, StoredReading};
use crate::payload::{AlertLabel, DecodedReading};
use crate::utils::parse_epoch_seconds;

const CREATE_READINGS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id BIGSERIAL PRIMARY KEY,
        device TEXT,
        time TEXT,
        station TEXT,
        data TEXT,
        rssi TEXT,
        seq TEXT,
        type TEXT,
        received_at TIMESTAMPTZ NOT NULL,
        temperature DOUBLE PRECISION,
        humidity DOUBLE PRECISION,
        battery DOUBLE PRECISION,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        alerts TEXT[] NOT NULL DEFAULT '{}'
    )";

/// Create the readings table if it does not exist yet
pub async fn create_schema(database_url: &str, policy: &RetryPolicy) -> Result<(), String> {
    execute_with_retry(database_url, policy, |client| async move {
        client.batch_execute(CREATE_READINGS_TABLE).await
    })
    .await
}

/// Append one decoded callback to the readings table
///
/// The raw callback fields are kept as text next to the decoded values
/// and alert labels, so a reading can be re-decoded later if needed.
///
/// # Arguments
/// * `new` - Callback, decoded reading and alerts to store
/// * `database_url` - PostgreSQL connection string
/// * `policy` - Retry policy for transient failures
///
/// # Returns
/// The stored reading with its database id
pub async fn insert_reading(
    new: &NewReading,
    database_url: &str,
    policy: &RetryPolicy,
) -> Result<StoredReading, String> {
    let owned = new.clone();

    let id = execute_with_retry(database_url, policy, move |client| {
        let new = owned.clone();
        async move {
            let alerts: Vec<String> = new.alerts.iter().map(|a| a.to_string()).collect();
            let row = client
                .query_one(
                    "INSERT INTO readings(device, time, station, data, rssi, seq, type, received_at,
                                          temperature, humidity, battery, latitude, longitude, alerts)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                     RETURNING id",
                    &[
                        &new.record.id,
                        &new.record.time,
                        &new.record.station,
                        &new.record.data,
                        &new.record.rssi,
                        &new.record.seq,
                        &new.record.message_type,
                        &new.received_at,
                        &new.decoded.temperature,
                        &new.decoded.humidity,
                        &new.decoded.battery,
                        &new.decoded.latitude,
                        &new.decoded.longitude,
                        &alerts,
                    ],
                )
                .await?;
            row.try_get::<_, i64>("id")
        }
    })
    .await?;

    Ok(new.clone().into_stored(id))
}

/// Fetch the most recent readings, newest first
pub async fn fetch_recent(
    limit: usize,
    database_url: &str,
    policy: &RetryPolicy,
) -> Result<Vec<StoredReading>, String> {
    let limit = sql_limit(limit);

    execute_with_retry(database_url, policy, move |client| async move {
        let rows = client
            .query(
                "SELECT id, device, time, station, data, rssi, seq, type, received_at,
                        temperature, humidity, battery, latitude, longitude, alerts
                 FROM readings ORDER BY id DESC LIMIT $1",
                &[&limit],
            )
            .await?;
        rows.iter().map(row_to_reading).collect()
    })
    .await
}

// LIMIT is a BIGINT; anything larger already means "all rows"
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn row_to_reading(row: &Row) -> Result<StoredReading, tokio_postgres::Error> {
    let time: Option<String> = row.try_get("time")?;
    let alerts: Vec<String> = row.try_get("alerts")?;

    Ok(StoredReading {
        id: row.try_get("id")?,
        device: row.try_get("device")?,
        device_time: time.as_deref().and_then(parse_epoch_seconds),
        time,
        station: row.try_get("station")?,
        data: row.try_get("data")?,
        rssi: row.try_get("rssi")?,
        seq: row.try_get("seq")?,
        message_type: row.try_get("type")?,
        received_at: row.try_get("received_at")?,
        decoded: DecodedReading {
            temperature: row.try_get("temperature")?,
            humidity: row.try_get("humidity")?,
            battery: row.try_get("battery")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        },
        // Labels written by an older build may no longer exist
        alerts: alerts
            .iter()
            .filter_map(|label| label.parse::<AlertLabel>().ok())
            .collect(),
    })
}
