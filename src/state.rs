use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::users::{repo::PgUserStore, store::UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
}

impl AppState {
    /// Reads configuration, connects to Postgres and runs migrations.
    /// Any missing setting aborts startup.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.database.clone())
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let store = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        Self {
            store,
            config,
            keys,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use sqlx::postgres::PgConnectOptions;

        use crate::config::JwtConfig;
        use crate::users::store::memory::MemoryUserStore;

        let config = Arc::new(AppConfig {
            database: PgConnectOptions::new_without_pgpass()
                .host("localhost")
                .database("postgres"),
            max_connections: 1,
            listen_addr: ([127, 0, 0, 1], 0).into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 10,
            },
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
