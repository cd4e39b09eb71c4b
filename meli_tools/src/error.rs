use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeliApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not refresh the access token: {0}")]
    Credential(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Order fetch failed. Error {status}. {message}")]
    OrderFetch { status: u16, message: String },
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
