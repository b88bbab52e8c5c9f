pub mod json;
pub mod traits;

pub use json::JsonConfigRepository;
pub use traits::ConfigStorage;
