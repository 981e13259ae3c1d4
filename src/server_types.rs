use actix_web::{ http::{ header::ContentType, StatusCode }, HttpResponse };
use derive_more::derive::{ Display, Error };
use serde_json::json;
use log::error;
use std::{ fmt, sync::Arc };
use crate::{ chain::EthRpc, db::DbPool, indexer::blocks::BlockIndexer };

pub type LiveIndexer = BlockIndexer<EthRpc, DbPool>;

#[derive(Display, Error)]
pub enum RespErr {
  #[display("Failed to query database")] DbErr {
    msg: String,
  },
  #[display("Validator not found")] ValidatorNotFound,
}

impl fmt::Debug for RespErr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RespErr::DbErr { msg } => write!(f, "{}", msg),
      _ => Ok(()),
    }
  }
}

impl actix_web::error::ResponseError for RespErr {
  fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
    let e = format!("{:?}", self);
    if e.len() > 0 {
      error!("{}", e);
    }
    HttpResponse::build(self.status_code())
      .insert_header(ContentType::json())
      .json(json!({ "error": self.to_string() }))
  }

  fn status_code(&self) -> StatusCode {
    match *self {
      RespErr::DbErr { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      RespErr::ValidatorNotFound => StatusCode::NOT_FOUND,
    }
  }
}

#[derive(Clone)]
pub struct Context {
  pub db: DbPool,
  pub indexer: Arc<LiveIndexer>,
}
