use deadpool_postgres::{ Config, CreatePoolError, Manager, ManagerConfig, RecyclingMethod, Runtime };
use deadpool::managed::Pool;
use tokio_postgres::{ types::{ ToSql, Type }, NoTls, Row };
use log::info;
use std::{ fmt, error };

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct DbQueryError {
  message: String,
}

impl DbQueryError {
  pub fn new(message: impl Into<String>) -> Self {
    DbQueryError { message: message.into() }
  }
}

impl error::Error for DbQueryError {}
impl fmt::Display for DbQueryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message)
  }
}

#[derive(Clone)]
pub struct DbPool {
  pool: Pool<Manager>,
}

impl DbPool {
  /// Builds the pool lazily, no connection is opened until the first query.
  pub fn init(psql_url: &str) -> Result<Self, CreatePoolError> {
    let mut cfg = Config::new();
    cfg.url = Some(psql_url.to_string());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    Ok(Self { pool })
  }

  pub async fn setup(&self) -> Result<(), DbQueryError> {
    let client = self.pool.get().await.map_err(|e| DbQueryError::new(e.to_string()))?;
    client.batch_execute(SCHEMA).await.map_err(|e| DbQueryError::new(e.to_string()))?;
    info!("Database schema is up to date");
    Ok(())
  }

  pub async fn query(&self, statement: &str, params: &[(&(dyn ToSql + Sync), Type)]) -> Result<Vec<Row>, DbQueryError> {
    let client = match self.pool.get().await {
      Ok(v) => v,
      Err(e) => {
        return Err(DbQueryError { message: e.to_string() });
      }
    };
    match client.query_typed(statement, params).await {
      Ok(rows) => Ok(rows),
      Err(e) => Err(DbQueryError { message: e.to_string() }),
    }
  }
}
