pub mod client;
pub mod error;
pub mod exp;
pub mod model;
pub mod template;
pub mod utils;

pub use client::ChatClient;
pub use error::Error;
pub use exp::{Exp, ProcessedResult, RoundResult, PaCoReProgressEvent};
pub use model::{ChatRequest, ChatResponse, Message};
pub use template::TemplateEngine;
pub use utils::{load_jsonl, save_jsonl};
