pub mod fusion;
pub mod hybrid;
pub mod lexical;
