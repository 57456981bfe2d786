pub mod fetcher;
pub mod line;
pub mod markup;

pub use fetcher::ReqwestFetcher;
pub use line::LineDispatcher;
pub use markup::ScraperMarkup;
