use crate::domain::error::DomainError;
use crate::domain::user::{CreateUser, LoginRequest};
use crate::presentation::handlers::{ApiError, AppState, UserResponse};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
}

#[instrument(skip(state, req))]
pub async fn register(
    state: web::Data<AppState>,
    req: web::Json<CreateUser>,
) -> Result<HttpResponse, ApiError> {
    let new_user = req.into_inner().validate()?;
    info!(email = %new_user.email, "Registration request received");

    let user = state.store.create(new_user).await.map_err(|e| {
        warn!(error = %e, "Failed to register user");
        ApiError::from(e)
    })?;

    info!(user_id = user.id, email = %user.email, "User registered successfully");
    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Registered successfully".to_string(),
        user: user.into(),
    }))
}

#[instrument(skip(state, req))]
pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let (email, password) = req.into_inner().validate()?;
    info!(email = %email, "Login request received");

    let user = state
        .store
        .find_by_credentials(&email, &password)
        .await?
        .ok_or_else(|| {
            warn!(email = %email, "Invalid credentials");
            DomainError::Unauthorized("Invalid email or password".to_string())
        })?;

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().json(LoginResponse {
        message: format!("Welcome {}", user.name),
        user: user.into(),
    }))
}
