//! # Sunny Chat Client
//!
//! Talks to a Sunny chat endpoint over HTTP. The client keeps a cookie jar,
//! so every call made through one [`ChatClient`] shares one server session and
//! therefore one conversation history.
//!
//! ```rust,no_run
//! use sunny_chat_client::ChatClient;
//!
//! # async fn run() -> sunny_chat_client::Result<()> {
//! let client = ChatClient::new("http://127.0.0.1:3001/api/chat")?;
//! let reply = client
//!     .stream("How much for 20 panels?", |token| print!("{}", token))
//!     .await?;
//! println!("\n{}", reply);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{ChatClient, DEFAULT_TIMEOUT, consume_stream};
pub use error::{ChatClientError, Result};
