mod blocking_tests;
mod merge_tests;
mod pipeline_tests;
mod rag_tests;
