pub mod balance_service;
pub mod catalog;
pub mod engine;
pub mod models;
pub mod purchase_service;
pub mod refund_service;
pub mod summary;
pub mod wizard;
