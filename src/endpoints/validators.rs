use actix_web::{ get, http::header, web, HttpResponse };
use tokio_postgres::types::Type;
use serde_json::json;
use crate::server_types::{ Context, RespErr };
use crate::store::{ validator_from_row, LedgerStore, VALIDATOR_COLUMNS };
use crate::types::ledger::{ NetworkStats, Validator };

pub fn validators_csv(validators: &[Validator]) -> String {
  let mut csv = String::from("address,total_blocks,missed_blocks,uptime_percentage,created_at\n");
  let rows: Vec<String> = validators
    .iter()
    .map(|v| format!("{},{},{},{},{}", v.address, v.total_blocks, v.missed_blocks, v.uptime_percentage, v.created_at))
    .collect();
  csv.push_str(&rows.join("\n"));
  csv
}

#[get("")]
async fn list_validators(ctx: web::Data<Context>) -> Result<HttpResponse, RespErr> {
  let validators = ctx.db.all_validators().await.map_err(|e| RespErr::DbErr { msg: e.to_string() })?;
  Ok(HttpResponse::Ok().json(json!({ "validators": validators })))
}

#[get("/stats")]
async fn network_stats(ctx: web::Data<Context>) -> Result<HttpResponse, RespErr> {
  let rows = ctx.db
    .query(
      "SELECT COUNT(*)::BIGINT, COALESCE(AVG(uptime_percentage),0)::DOUBLE PRECISION, COALESCE(SUM(total_blocks),0)::BIGINT, COALESCE(SUM(missed_blocks),0)::BIGINT FROM validators;",
      &[]
    ).await
    .map_err(|e| RespErr::DbErr { msg: e.to_string() })?;
  let stats = match rows.first() {
    Some(r) => NetworkStats { total_validators: r.get(0), avg_uptime: r.get(1), total_blocks: r.get(2), total_missed: r.get(3) },
    None => NetworkStats { total_validators: 0, avg_uptime: 0.0, total_blocks: 0, total_missed: 0 },
  };
  Ok(HttpResponse::Ok().json(json!({ "stats": stats })))
}

#[get("/export")]
async fn export_csv(ctx: web::Data<Context>) -> Result<HttpResponse, RespErr> {
  let validators = ctx.db.all_validators().await.map_err(|e| RespErr::DbErr { msg: e.to_string() })?;
  Ok(
    HttpResponse::Ok()
      .insert_header((header::CONTENT_TYPE, "text/csv"))
      .insert_header((header::CONTENT_DISPOSITION, "attachment; filename=\"validators.csv\""))
      .body(validators_csv(&validators))
  )
}

#[get("/{address}")]
async fn validator_by_address(path: web::Path<String>, ctx: web::Data<Context>) -> Result<HttpResponse, RespErr> {
  let address = path.into_inner().to_lowercase();
  let rows = ctx.db
    .query(
      format!("SELECT {} FROM validators WHERE address=$1;", VALIDATOR_COLUMNS).as_str(),
      &[(&address, Type::VARCHAR)]
    ).await
    .map_err(|e| RespErr::DbErr { msg: e.to_string() })?;
  match rows.first() {
    Some(r) => Ok(HttpResponse::Ok().json(json!({ "validator": validator_from_row(r) }))),
    None => Err(RespErr::ValidatorNotFound),
  }
}

pub fn scope() -> actix_web::Scope {
  web::scope("/api/validators")
    .service(list_validators)
    .service(network_stats)
    .service(export_csv)
    .service(validator_by_address)
}
