pub mod client;
pub mod gemini;
