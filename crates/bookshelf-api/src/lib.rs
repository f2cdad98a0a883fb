// HTTP access to the book backend: account endpoints, chat, and search.

pub mod auth;
pub mod chat;
pub mod client;
pub mod error;

pub use auth::AuthApi;
pub use chat::ContentApi;
pub use client::ApiClient;
pub use error::ApiError;
