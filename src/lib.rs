//! Signup bot: a chat registration service that collects a name and a
//! phone number from each user and records them exactly once.

pub mod api;
pub mod channels;
pub mod config;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod session;
pub mod store;
