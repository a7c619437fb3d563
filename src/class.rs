mod parser;
mod structs;

pub use parser::parse;
pub use structs::*;
