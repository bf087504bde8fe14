//! Language-model and image-generation clients for Clipmaker.
//!
//! # Core Types
//!
//! - [`StepGenerator`]: asks a chat model for the narration steps of one activity
//! - [`ChatCompletion`]: chat backend seam, implemented by [`ChatClient`]
//! - [`ImageGenerator`]: image backend seam, implemented by [`ReplicateClient`],
//!   [`FalClient`] and [`OpenAiImageClient`]
//! - [`ImageGenError`]: backend failures, classified by [`ImageGenError::is_retryable`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use clipmaker_agent::{ChatClient, StepGenerator};
//!
//! let client = Arc::new(ChatClient::from_config(&config.chat)?);
//! let plan = StepGenerator::new(client, &config.chat).generate().await?;
//! for step in &plan.steps {
//!     println!("{}: {}", step.label, step.text);
//! }
//! ```

pub mod client;
pub mod error;
pub mod images;
pub mod prompts;
pub mod steps;

pub use client::{ChatClient, ChatCompletion, ChatMessage, ChatRequest, ChatResponse};
pub use error::{AgentError, ImageGenError, ImageResult, Result};
pub use images::{
    create_image_generator, FalClient, ImageGenerator, OpenAiImageClient, ReplicateClient,
};
pub use steps::StepGenerator;
