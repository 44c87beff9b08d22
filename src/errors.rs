use thiserror::Error;

/// Error type for benchmark runs. Every variant is fatal to the program.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("sqlite error in {context}: {source}")]
    Engine {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("value mismatch in {context}: expected {expected}, got {actual}")]
    Mismatch {
        context: String,
        expected: String,
        actual: String,
    },
    #[error("report io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no samples recorded for {0}")]
    EmptySamples(String),
    #[error("worker failed: {0}")]
    Worker(String),
}

impl BenchError {
    pub fn engine<T: Into<String>>(context: T, source: rusqlite::Error) -> Self {
        BenchError::Engine {
            context: context.into(),
            source,
        }
    }

    pub fn mismatch<T, E, A>(context: T, expected: E, actual: A) -> Self
    where
        T: Into<String>,
        E: ToString,
        A: ToString,
    {
        BenchError::Mismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        BenchError::InvalidInput(msg.into())
    }

    pub fn empty_samples<T: Into<String>>(name: T) -> Self {
        BenchError::EmptySamples(name.into())
    }

    pub fn worker<T: Into<String>>(msg: T) -> Self {
        BenchError::Worker(msg.into())
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, BenchError::Mismatch { .. })
    }
}

/// Attaches a call-site description to engine results.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, BenchError>;

    /// Like [`ResultExt::context`], building the text only on failure.
    fn with_context<C, F>(self, f: F) -> Result<T, BenchError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for rusqlite::Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T, BenchError> {
        self.map_err(|e| BenchError::engine(context, e))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, BenchError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| BenchError::engine(f(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_carries_both_values() {
        let err = BenchError::mismatch("select ID check", 7, 9);
        assert!(err.is_mismatch());
        assert_eq!(
            err.to_string(),
            "value mismatch in select ID check: expected 7, got 9"
        );
    }

    #[test]
    fn test_context_wraps_engine_error() {
        let res: rusqlite::Result<()> = Err(rusqlite::Error::InvalidQuery);
        let err = res.context("prepare select").unwrap_err();
        assert!(matches!(err, BenchError::Engine { ref context, .. } if context == "prepare select"));
    }
}
