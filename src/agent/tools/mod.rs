pub mod shell;
pub mod memory;
pub mod web_search;
pub mod crawl;

pub use shell::ShellTool;
pub use memory::MemoryTool;
pub use web_search::WebSearchTool;
pub use crawl::CrawlTool;
