pub mod completion;
pub mod llm_instructions;
