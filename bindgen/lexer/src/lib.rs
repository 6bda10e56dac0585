pub mod token;

pub use token::{tokenize, SpannedToken, Token};
