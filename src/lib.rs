pub mod check;
pub mod cli;
pub mod discover;
pub mod error;
pub mod output;
pub mod plan;
pub mod template;

pub use template::{tokenize, Match, Options, Pattern, TemplateError, Token};
