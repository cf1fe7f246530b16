pub mod dispatch_service;
pub mod fallback_service;
pub mod generation_service;
pub mod llm_service;
pub mod parser_service;
pub mod validation_service;
