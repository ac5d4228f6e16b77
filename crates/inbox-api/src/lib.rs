pub mod auth;
pub mod contacts;
pub mod inbox;
pub mod middleware;
pub mod router;
pub mod views;
