use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToronError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
