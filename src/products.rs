use crate::config::DbConfig;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Row};
use std::time::Duration;

/// Mirrors a row of the externally provisioned `products` table
/// (`id serial, name varchar, cost int, quantity int`). Cost is in the
/// smallest currency unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    #[serde(rename = "ID")]
    pub id: i32,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Cost")]
    pub cost: i32,
    #[serde(rename = "Quantity")]
    pub quantity: i32,
}

/// The one store capability handlers need. Implementations must be safe for
/// concurrent use by in-flight requests.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error>;
}

#[async_trait]
impl ProductStore for PgPool {
    async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, name, cost, quantity FROM products")
            .fetch_all(self)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Product {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    cost: row.try_get("cost")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }
}

/// Opens the connection pool. Eager: the first connection is established
/// here, so an unreachable store fails startup instead of the first request.
pub async fn connect(cfg: &DbConfig) -> Result<PgPool, sqlx::Error> {
    let ssl_mode = match cfg.ssl_mode() {
        "disable" => PgSslMode::Disable,
        _ => PgSslMode::Require,
    };

    let opts = PgConnectOptions::new()
        .host(&cfg.host)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .ssl_mode(ssl_mode)
        .options([("timezone", "UTC")]);

    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(opts)
        .await
}

/// Single-shot release of the connection pool. Consuming `self` keeps the
/// caller honest: teardown runs exactly once, after the server has stopped.
pub struct Teardown {
    pool: PgPool,
}

impl Teardown {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
