//! HTTP surface for the duci CI dispatcher.
//!
//! `POST /` receives GitHub webhooks; `GET /logs/{uuid}` serves persisted
//! job logs.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;
