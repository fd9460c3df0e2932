use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tokio::sync::OnceCell;

use crate::domain::{Aggregate, Reading};
use crate::error::StoreError;
use crate::store::Store;

// column names predate the wire names (hum / update_at)
const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS readings (
        temp      DOUBLE PRECISION NOT NULL,
        hum       DOUBLE PRECISION NOT NULL,
        lpg       DOUBLE PRECISION,
        co        DOUBLE PRECISION,
        smoke     DOUBLE PRECISION,
        pressure  DOUBLE PRECISION,
        alt       DOUBLE PRECISION,
        update_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS readings_update_at_idx ON readings (update_at DESC)";

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    temp: f64,
    hum: f64,
    lpg: Option<f64>,
    co: Option<f64>,
    smoke: Option<f64>,
    pressure: Option<f64>,
    alt: Option<f64>,
    update_at: DateTime<Utc>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            temp: row.temp,
            humidity: row.hum,
            lpg: row.lpg,
            co: row.co,
            smoke: row.smoke,
            pressure: row.pressure,
            alt: row.alt,
            observed_at: Some(row.update_at),
        }
    }
}

#[derive(Debug, Default, sqlx::FromRow)]
struct AggregateRow {
    count: i64,
    max_temp: Option<f64>,
    min_temp: Option<f64>,
    avg_temp: Option<f64>,
    max_hum: Option<f64>,
    min_hum: Option<f64>,
    avg_hum: Option<f64>,
    max_pressure: Option<f64>,
}

impl From<AggregateRow> for Aggregate {
    fn from(row: AggregateRow) -> Self {
        Aggregate {
            count: row.count.max(0) as u64,
            max_temp: row.max_temp.unwrap_or_default(),
            min_temp: row.min_temp.unwrap_or_default(),
            avg_temp: row.avg_temp.unwrap_or_default(),
            max_hum: row.max_hum.unwrap_or_default(),
            min_hum: row.min_hum.unwrap_or_default(),
            avg_hum: row.avg_hum.unwrap_or_default(),
            max_pressure: row.max_pressure,
        }
    }
}

/// readings table in a remote postgres database
///
/// the pool connects lazily so the service can boot while the database is
/// unreachable; the table is created on first successful contact. pool
/// acquire is bounded here; whole calls are bounded by `TimeoutStore`.
#[derive(Debug)]
pub struct PostgresStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PostgresStore {
    pub fn connect_lazy(
        database_url: &str,
        auth_token: Option<&str>,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut options = PgConnectOptions::from_str(database_url)?;
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            options = options.password(token);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn ready(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
                tracing::info!("readings table ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn append(&self, reading: &Reading) -> Result<DateTime<Utc>, StoreError> {
        self.ready().await?;
        let observed_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO readings (temp, hum, lpg, co, smoke, pressure, alt)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING update_at
            "#,
        )
        .bind(reading.temp)
        .bind(reading.humidity)
        .bind(reading.lpg)
        .bind(reading.co)
        .bind(reading.smoke)
        .bind(reading.pressure)
        .bind(reading.alt)
        .fetch_one(&self.pool)
        .await?;

        Ok(observed_at)
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        self.ready().await?;
        let row = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT temp, hum, lpg, co, smoke, pressure, alt, update_at
            FROM readings
            ORDER BY update_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Reading::from))
    }

    async fn window_aggregate(&self, window: Duration) -> Result<Aggregate, StoreError> {
        self.ready().await?;
        let row = sqlx::query_as::<_, AggregateRow>(
            r#"
            SELECT COUNT(*)      AS count,
                   MAX(temp)     AS max_temp,
                   MIN(temp)     AS min_temp,
                   AVG(temp)     AS avg_temp,
                   MAX(hum)      AS max_hum,
                   MIN(hum)      AS min_hum,
                   AVG(hum)      AS avg_hum,
                   MAX(pressure) AS max_pressure
            FROM readings
            WHERE update_at >= now() - make_interval(secs => $1)
              AND update_at <= now()
            "#,
        )
        .bind(window.as_secs_f64())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.ready().await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
