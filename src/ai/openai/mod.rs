pub mod client;
pub mod puzzle;
pub mod types;

pub use puzzle::OpenAiPuzzleClient;
