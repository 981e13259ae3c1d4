use actix_web::{ get, web, HttpResponse, Responder };
use chrono::Utc;
use serde_json::json;
use crate::server_types::Context;

pub const SERVICE_NAME: &str = "validator-uptime-indexer";

#[get("/health")]
async fn health(ctx: web::Data<Context>) -> impl Responder {
  let indexer = ctx.indexer.status();
  HttpResponse::Ok().json(
    json!({
      "status": "ok",
      "service": SERVICE_NAME,
      "timestamp": Utc::now().to_rfc3339(),
      "indexer": {
        "running": indexer.is_running,
        "lastBlock": indexer.last_processed_block,
        "initialized": indexer.initialized
      }
    })
  )
}

pub async fn not_found() -> impl Responder {
  HttpResponse::NotFound().json(json!({ "error": "Not found" }))
}
