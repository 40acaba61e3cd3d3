// Shipped collectors

pub mod flagstat;
pub mod gc_content;

pub use flagstat::FlagstatCollector;
pub use gc_content::GcContentCollector;
