pub mod client;
pub mod courses;
pub mod crosslist;
pub mod normalize;
pub mod summarize;
pub mod validate;

pub use client::CanvasClient;
pub use crosslist::{CrosslistService, OperationContext};
