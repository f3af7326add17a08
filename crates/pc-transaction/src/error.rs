use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction author must not be empty")]
    EmptyAuthor,

    #[error("transaction content must not be empty")]
    EmptyContent,
}
