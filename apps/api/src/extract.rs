//! Request body extraction that answers in the response envelope.

use axum::extract::FromRequest;

use crate::errors::AppError;

/// `axum::Json` whose rejections (malformed JSON, missing or mistyped
/// fields, wrong content type) become `AppError::Validation`, so clients
/// always receive `{success:false, message, data:null}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
