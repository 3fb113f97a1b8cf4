use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::JwtKeys;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let jwt = Arc::new(JwtKeys::new(&config.auth));
        Self { db, config, jwt }
    }
}
