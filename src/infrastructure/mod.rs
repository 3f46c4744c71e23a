pub mod config;
pub mod csv;
pub mod llm_clients;
pub mod notion;
pub mod response;
pub mod security;
pub mod slack;
pub mod translate;
