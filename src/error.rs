use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("database error: {0}")]
  Db(#[from] sea_orm::DbErr),

  #[error("telegram api error: {0}")]
  Telegram(#[from] teloxide::RequestError),

  #[error("invalid init data")]
  Unauthorized,

  #[error("user not found")]
  UserNotFound,

  #[error("wrong keyword")]
  WrongKeyword,

  #[error("quiz is not finished")]
  QuizUnfinished,

  #[error("invalid phone number")]
  InvalidPhone,

  #[error("not subscribed to the channel")]
  NotSubscribed,

  #[error("insufficient points: have {have}, need {need}")]
  InsufficientPoints { have: i64, need: i64 },

  #[error("unknown prize")]
  UnknownPrize,

  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Db(_) | Error::Telegram(_) | Error::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
      Error::UserNotFound | Error::UnknownPrize => StatusCode::NOT_FOUND,
      Error::InsufficientPoints { .. } => StatusCode::CONFLICT,
      Error::WrongKeyword
      | Error::QuizUnfinished
      | Error::InvalidPhone
      | Error::NotSubscribed => StatusCode::BAD_REQUEST,
    };

    // transport/backend details never reach the user
    let message = match &self {
      Error::Db(_) | Error::Telegram(_) | Error::Internal(_) => {
        "Internal error, try again later".to_string()
      }
      err => err.to_string(),
    };

    let body = json::json!({
      "success": false,
      "error": message,
    });

    (status, Json(body)).into_response()
  }
}
