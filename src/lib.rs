//! intent-mail: classify the intent of an email draft, render a reply from
//! the matching template and send it over SMTP.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod templates;
pub mod workflow;
