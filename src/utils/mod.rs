pub mod id_generator;
pub mod retry;

pub use id_generator::{IdGenerator, IdType, WithGeneratedId};
pub use retry::RetryPolicy;
