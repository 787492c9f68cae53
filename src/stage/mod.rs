pub mod client;
pub mod context;
pub mod error;
pub mod types;

pub use client::{HttpStageInvoker, StageInvoker};
pub use context::ChainContext;
pub use error::StageError;
pub use types::{StageInput, StageOutput};
