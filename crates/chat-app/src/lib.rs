pub mod app;
pub mod chat;
pub mod llm;
pub mod settings;
