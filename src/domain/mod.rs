pub mod embedding;
pub mod matching;
pub mod posting;
