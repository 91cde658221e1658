pub mod bbox;
pub mod dissolve;
pub mod guard;
pub mod matching;
pub mod resolver;
