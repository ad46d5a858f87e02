pub mod graph;
pub mod llm;
