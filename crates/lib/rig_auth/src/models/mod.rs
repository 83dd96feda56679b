//! Domain types shared by the auth core and its collaborators.

pub mod auth;
pub mod service_account;
pub mod settings;
