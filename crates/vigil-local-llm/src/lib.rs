//! # vigil-local-llm
//!
//! [`ModelGateway`](vigil_kernel::ModelGateway) for a locally hosted
//! [Ollama](https://ollama.com) server, spoken to over its HTTP API.
//!
//! Besides generation the gateway supports warm reloading and switching
//! quantization tiers by moving between model tags (`llama3:q4_0`,
//! `llama3:q8_0`, ...), pulling a tag first when it is not installed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil_kernel::{GenerateOptions, ModelGateway};
//! use vigil_local_llm::{OllamaConfig, OllamaGateway};
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = OllamaGateway::new(OllamaConfig::from_env()).unwrap();
//!     let reply = gateway.generate("Hello", &GenerateOptions::new()).await.unwrap();
//!     println!("{reply}");
//! }
//! ```

pub mod config;
pub mod provider;

pub use config::OllamaConfig;
pub use provider::OllamaGateway;
