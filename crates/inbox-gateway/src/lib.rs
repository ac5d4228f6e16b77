pub mod connection;
pub mod controller;
pub mod registry;
pub mod workspace;
