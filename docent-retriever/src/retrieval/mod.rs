pub mod extractor;
pub mod indexing_engine;
pub mod orchestrator;
pub mod ranker;
pub mod record_builder;
