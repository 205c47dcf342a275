pub mod completion;
pub mod indictment;

pub use completion::{CompletionChoice, CompletionRequest, CompletionResponse, Usage};
pub use indictment::{ChatMessage, GenerateIndictmentBody};
