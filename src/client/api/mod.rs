//! Transport trait definitions split by responsibility
//!
//! - [`AuthApi`] - credential issuance and revocation (`/auth/*`)
//! - [`DispatchApi`] - sending a single resource request
//!
//! The [`Transport`](super::Transport) super-trait combines both.

mod auth;
mod dispatch;

pub use auth::AuthApi;
pub use dispatch::DispatchApi;
