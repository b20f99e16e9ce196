//! REST API for facereg.
//!
//! Routes and Spanish wire names are the ones the web client speaks:
//! `/register`, `/recognize`, `/images`, `/registered_faces/{filename}`,
//! `/delete_image`, `/edit_user`, `/user_data` plus `/health`.

pub mod rest;

pub use rest::{routes, RestApi};
