//! Deckbridge - PowerPoint Translation Agent
//!
//! A chat agent that collects a presentation from the user and translates
//! every text run between Traditional Chinese, English and Japanese while
//! keeping the original formatting.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod messages;
pub mod notify;
pub mod pptx;
pub mod style;
pub mod translate;
pub mod upload;
pub mod walker;
pub mod workflow;
