mod capstan;

pub use capstan::{CapstanError, STATE_LOCK_MARKER};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
