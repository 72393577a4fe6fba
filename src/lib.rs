pub mod automaton;
pub mod datetime;
pub mod demo;
pub mod error;
pub mod interpreter;
pub mod kmp;
pub mod lexicon;
pub mod node;
pub mod query;
pub mod rules;
pub mod token;
pub mod tokenize;
