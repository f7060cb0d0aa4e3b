use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Expected a numeric value for {what}, found {found}")]
    NotNumeric { what: &'static str, found: String },
}
