use crate::application::user_store::UserStore;
use crate::domain::error::DomainError;
use crate::domain::user::{User, UserPatch};
use actix_web::{HttpRequest, HttpResponse, ResponseError, error::JsonPayloadError, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

// AppState holding the record store
pub struct AppState {
    pub store: UserStore,
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            ApiError::Validation(_) => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => actix_web::http::StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => actix_web::http::StatusCode::UNAUTHORIZED,
            ApiError::Internal => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        let details = match self {
            ApiError::Conflict(msg) => {
                serde_json::json!({ "message": msg, "userNotAvailable": true })
            }
            _ => serde_json::json!({ "message": error_msg }),
        };

        match self {
            ApiError::Internal => error!(status = %status, "Internal error"),
            _ => warn!(error = %error_msg, status = %status, "Request rejected"),
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_msg,
            details,
        })
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            DomainError::Internal(msg) => {
                error!(error = %msg, "Internal domain error");
                ApiError::Internal
            }
        }
    }
}

// Anything that is not a DomainError is an unexpected store failure; the
// detail is logged and withheld from the client.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DomainError>() {
            Ok(domain) => domain.into(),
            Err(err) => {
                let detail = format!("{:#}", err);
                error!(error = %detail, "Store failure");
                ApiError::Internal
            }
        }
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::Validation(format!("Invalid JSON body: {}", err)).into()
}

/// A user as returned over HTTP. Credentials stay in the store.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: UserResponse,
}

// Ids that do not parse can never match a record.
fn parse_id(raw: &str) -> Result<u64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("User not found: {}", raw)))
}

// Handlers

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    info!("Health check requested");
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

/// Newest first, as the form lists them.
#[instrument(skip(state))]
pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut users = state.store.find_all().await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    info!(count = users.len(), "Listing users");
    let body: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[instrument(skip(state), fields(user_id = %*path))]
pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = parse_id(&path)?;
    let user = state.store.find_by_id(user_id).await?;
    info!(user_id = user.id, "User retrieved");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Serves both PUT and PATCH: the body is merged over the stored record.
#[instrument(skip(state, req), fields(user_id = %*path))]
pub async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<UserPatch>,
) -> Result<HttpResponse, ApiError> {
    let user_id = parse_id(&path)?;
    let patch = req.into_inner();
    patch.validate()?;
    let user = state.store.update_by_id(user_id, patch).await.map_err(|e| {
        warn!(user_id = user_id, error = %e, "Failed to update user");
        e
    })?;
    info!(user_id = user.id, "User updated successfully");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[instrument(skip(state), fields(user_id = %*path))]
pub async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = parse_id(&path)?;
    let user = state.store.delete_by_id(user_id).await?;
    info!(user_id = user.id, "User deleted successfully");
    Ok(HttpResponse::Ok().json(DeleteResponse {
        deleted: user.into(),
    }))
}
