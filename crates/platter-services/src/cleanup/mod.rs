pub mod service;

pub use service::ArchiveSweeper;
