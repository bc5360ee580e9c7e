use thiserror::Error;

/// Outcome of a call made through the reliability layer.
#[derive(Debug, Error)]
pub enum ReliabilityError<E> {
    /// The breaker was open; the operation was not invoked.
    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> ReliabilityError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::Inner(err) => Some(err),
        }
    }
}
