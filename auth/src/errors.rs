use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Credential store error: {0}")]
    Store(String),
    #[error("Connection pool error: {0}")]
    Pool(String),
    #[error("Password hashing error: {0}")]
    Hash(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<tokio_postgres::Error> for AuthError {
    fn from(e: tokio_postgres::Error) -> Self {
        AuthError::Store(e.to_string())
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for AuthError {
    fn from(e: bb8::RunError<tokio_postgres::Error>) -> Self {
        AuthError::Pool(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
