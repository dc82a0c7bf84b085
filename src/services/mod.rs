//! Services Layer
//!
//! Business logic shared by the web handlers and the background refresh
//! worker. Services are unit structs whose associated functions take the
//! shared `AppState`.
//!
//! # Services
//!
//! - `QuotesService` - Cached live quotes, single and batched
//! - `TickerService` - Ticker identity, financials and end-of-day prices
//! - `IntradayService` - Price moments through a trading day
//! - `MoversService` - Daily gainers, losers and most active
//! - `NewsService` - Ticker and market news
//! - `SearchService` - Ticker lookup by symbol or name
//! - `RefreshScheduler` - Queues stale refreshes when a ticker is viewed
//! - `ViewService` - Page view-models

pub mod intraday_service;
pub mod movers_service;
pub mod news_service;
pub mod quotes_service;
pub mod refresh_service;
pub mod search_service;
pub mod ticker_service;
pub mod view_service;

pub use intraday_service::IntradayService;
pub use movers_service::{MoverRow, MoversService, MoversView};
pub use news_service::NewsService;
pub use quotes_service::QuotesService;
pub use refresh_service::{NewsStatus, RefreshScheduler};
pub use search_service::{SearchResult, SearchService};
pub use ticker_service::TickerService;
pub use view_service::{DesktopView, IntradayView, RecentPlus, TickerView, ViewService};
