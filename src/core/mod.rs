pub mod engine;
pub mod feeds;
pub mod importer;
pub mod newsletter;
pub mod server;
pub mod sitemap;
pub mod widgets;

pub use engine::Engine;
pub use importer::{import_directory, ImportReport};
pub use server::Server;
