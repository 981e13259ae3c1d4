use actix_web::{ web, App, HttpServer };
use env_logger;
use std::{ process, sync::Arc };
use log::{ error, info, warn };
mod chain;
mod config;
mod db;
mod endpoints;
mod indexer;
mod server;
mod server_types;
mod store;
mod types;

use indexer::{ blocks::{ BlockIndexer, IndexerParams, DEFAULT_BATCH_SIZE, DEFAULT_LOOKBACK }, indexer::{ Indexer, DEFAULT_INTERVAL_SECS } };

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  if config::args.dump_config {
    if let Err(e) = config::TomlConfig::dump_config_file(config::args.config_file.as_str()) {
      eprintln!("Failed to write sample config: {}", e);
      process::exit(1);
    }
    return Ok(());
  }
  let config = &config::config;
  if std::env::var("RUST_LOG").is_err() {
    std::env::set_var("RUST_LOG", config.log_level.clone().unwrap_or(String::from("info")));
  }
  env_logger::init();
  let db_pool = match db::DbPool::init(config.psql_url.as_str()) {
    Ok(p) => p,
    Err(e) => {
      error!("Failed to initialize db pool: {}", e.to_string());
      process::exit(1);
    }
  };
  match db_pool.setup().await {
    Ok(_) => (),
    Err(e) => {
      error!("Failed to setup db: {}", e.to_string());
      process::exit(1);
    }
  }
  let rpc = match chain::EthRpc::init(config.rpc.url.as_str(), config.rpc.timeout_secs.unwrap_or(30)) {
    Ok(r) => r,
    Err(e) => {
      error!("Failed to initialize rpc client: {}", e);
      process::exit(1);
    }
  };
  let params = IndexerParams {
    batch_size: config.indexer.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
    lookback: config.indexer.lookback.unwrap_or(DEFAULT_LOOKBACK),
    skip_after_attempts: config.indexer.skip_after_attempts,
  };
  let block_idxer = Arc::new(BlockIndexer::init(rpc, db_pool.clone(), params));
  match block_idxer.initialize().await {
    Ok(_) => info!("Indexer initialized"),
    Err(e) => warn!("Indexer init failed, retrying on the next cycle: {}", e),
  }
  Indexer::init(Arc::clone(&block_idxer), config.indexer.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)).start();

  let server_ctx = server_types::Context { db: db_pool, indexer: block_idxer };
  info!("Listening on {}:{}", config.server.address, config.server.port);
  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(server_ctx.clone()))
      .service(server::health)
      .service(endpoints::validators::scope())
      .default_service(web::to(server::not_found))
  })
    .bind((config.server.address.as_str(), config.server.port))?
    .run().await
}
