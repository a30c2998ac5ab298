use actix_web::error::InternalError;
use actix_web::HttpResponse;
use paperclip::actix::web;

use crate::handlers;
use crate::validation::ValidationErrors;

pub fn config_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::welcome)))
        .service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(
            web::scope("/books")
                .service(
                    web::resource("")
                        .route(web::get().to(handlers::list_books))
                        .route(web::post().to(handlers::create_book)),
                )
                .service(
                    web::resource("/stats/reading").route(web::get().to(handlers::reading_stats)),
                )
                .service(
                    web::resource("/{book_id}")
                        .route(web::get().to(handlers::get_book))
                        .route(web::put().to(handlers::update_book))
                        .route(web::delete().to(handlers::delete_book)),
                ),
        );
}

/// Malformed bodies are reported like any other validation failure
pub fn json_config() -> actix_web::web::JsonConfig {
    actix_web::web::JsonConfig::default().error_handler(|err, _req| {
        let errors = ValidationErrors::single("body", err.to_string());
        InternalError::from_response(err, HttpResponse::UnprocessableEntity().json(errors)).into()
    })
}

pub fn query_config() -> actix_web::web::QueryConfig {
    actix_web::web::QueryConfig::default().error_handler(|err, _req| {
        let errors = ValidationErrors::single("query", err.to_string());
        InternalError::from_response(err, HttpResponse::UnprocessableEntity().json(errors)).into()
    })
}
