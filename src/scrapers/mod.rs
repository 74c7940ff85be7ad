pub mod browser;
pub mod discovery;
pub mod extractor;
pub mod http;
pub mod normalize;
pub mod rumah123;
pub mod strategy;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod fixture;

pub use browser::ChromeRenderer;
pub use discovery::PageRangeDiscoverer;
pub use extractor::PageExtractor;
pub use http::HttpRenderer;
pub use rumah123::{CatalogLayout, LAYOUT};
pub use traits::Renderer;
pub use types::{DiscoverySettings, ExtractSettings, ScrollPlan};
