use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::web::Data;
use paperclip::actix::{
    api_v2_operation,
    web::{self, Json},
};

use crate::api::{
    BookId, BookPatch, EndpointPaths, ErrorDetail, ListBooksQuery, MessageResponse, NewBook,
    WelcomeResponse,
};
use crate::book_service::{BookService, BookServiceError};

pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

fn error_response(operation: &str, err: BookServiceError) -> HttpResponse {
    match err {
        BookServiceError::NotFound(_) => HttpResponse::NotFound().json(ErrorDetail {
            detail: "Book not found".to_string(),
        }),
        BookServiceError::Validation(errors) => HttpResponse::UnprocessableEntity().json(errors),
        BookServiceError::Repository(err) => {
            tracing::error!("{} failed {}", operation, err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[api_v2_operation]
pub async fn health() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok().finish())
}

#[api_v2_operation]
pub async fn welcome() -> Result<Json<WelcomeResponse>, Error> {
    Ok(Json(WelcomeResponse {
        message: "Welcome to the Book Collection API".to_string(),
        docs: "/apispec/v2".to_string(),
        endpoints: EndpointPaths {
            books: "/books".to_string(),
            reading_stats: "/books/stats/reading".to_string(),
        },
    }))
}

#[api_v2_operation]
pub async fn create_book(
    book_service: Data<BookService>,
    new_book: web::Json<NewBook>,
) -> Result<HttpResponse, Error> {
    Ok(
        match book_service.create_book(new_book.into_inner()).await {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(err) => error_response("Create book", err),
        },
    )
}

#[api_v2_operation]
pub async fn list_books(
    book_service: Data<BookService>,
    query: web::Query<ListBooksQuery>,
) -> Result<HttpResponse, Error> {
    let query = query.into_inner();
    let total = match book_service.count_books(&query).await {
        Ok(total) => total,
        Err(err) => return Ok(error_response("Count books", err)),
    };
    Ok(match book_service.list_books(&query).await {
        Ok(books) => HttpResponse::Ok()
            .append_header((TOTAL_COUNT_HEADER, total.to_string()))
            .json(books),
        Err(err) => error_response("List books", err),
    })
}

#[api_v2_operation]
pub async fn get_book(
    book_service: Data<BookService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.get_book(book_id.into_inner()).await {
        Ok(book) => HttpResponse::Ok().json(book),
        Err(err) => error_response("Get book", err),
    })
}

#[api_v2_operation]
pub async fn update_book(
    book_service: Data<BookService>,
    book_id: web::Path<BookId>,
    patch: web::Json<BookPatch>,
) -> Result<HttpResponse, Error> {
    Ok(
        match book_service
            .update_book(book_id.into_inner(), patch.into_inner())
            .await
        {
            Ok(book) => HttpResponse::Ok().json(book),
            Err(err) => error_response("Update book", err),
        },
    )
}

#[api_v2_operation]
pub async fn delete_book(
    book_service: Data<BookService>,
    book_id: web::Path<BookId>,
) -> Result<HttpResponse, Error> {
    Ok(match book_service.delete_book(book_id.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(MessageResponse {
            message: "Book deleted successfully".to_string(),
        }),
        Err(err) => error_response("Delete book", err),
    })
}

#[api_v2_operation]
pub async fn reading_stats(book_service: Data<BookService>) -> Result<HttpResponse, Error> {
    Ok(match book_service.reading_stats().await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(err) => error_response("Reading stats", err),
    })
}
