pub mod console_notifier;
pub mod http_listings_source;
pub mod memory_store;
pub mod multi_notifier;
pub mod scripted_source;
pub mod sqlite_store;
pub mod webhook_notifier;
