use crate::presentation::auth::{login, register};
use crate::presentation::handlers::{
    delete_user, get_user, health_check, json_error_handler, list_users, update_user,
};
use actix_web::web;

pub const ROUTES: &str = "GET /health, POST /users, GET /users, GET|PUT|PATCH|DELETE /users/{id}, POST /login \
    (also under /api, plus POST /api/register and GET /api/records)";

/// Registers every route at the root and again under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(
            web::scope("/api")
                .route("/register", web::post().to(register))
                .route("/records", web::get().to(list_users))
                .configure(user_routes),
        )
        .configure(user_routes);
}

fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/login", web::post().to(login))
        .service(
            web::resource("/users")
                .route(web::post().to(register))
                .route(web::get().to(list_users)),
        )
        .service(
            web::resource("/users/{id}")
                .route(web::get().to(get_user))
                .route(web::put().to(update_user))
                .route(web::patch().to(update_user))
                .route(web::delete().to(delete_user)),
        );
}
