pub mod initialization;
pub mod repository;
pub mod service;
pub mod types;
