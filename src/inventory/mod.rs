pub mod cached_client;
pub mod client;
pub mod types;

pub use cached_client::CachedInventoryClient;
pub use client::InventoryClient;
pub use types::DashboardStats;
