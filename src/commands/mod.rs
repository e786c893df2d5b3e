pub mod index;
pub mod parse;
pub mod search;
pub mod status;
