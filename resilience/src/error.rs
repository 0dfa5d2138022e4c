use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError<E: std::error::Error + 'static> {
    #[error("circuit open for operation '{operation}'")]
    CircuitOpen { operation: String },

    #[error("operation '{operation}' failed: {source}")]
    Inner {
        operation: String,
        #[source]
        source: E,
    },
}
