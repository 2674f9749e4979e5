pub mod filesystem;
pub mod web_search;

pub use filesystem::LocalFileStore;
pub use web_search::{create_search, format_hits, SimulatedSearch, TavilySearch};
