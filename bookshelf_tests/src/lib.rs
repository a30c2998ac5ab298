//! Tests running against a deployed bookshelf service.
//! The service url is taken from `BOOKSHELF_URL`, defaulting to http://127.0.0.1:8080



#[cfg(test)]
pub(crate) fn service_url() -> String {
    std::env::var("BOOKSHELF_URL").unwrap_or("http://127.0.0.1:8080".to_string())
}
