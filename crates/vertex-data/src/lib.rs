//! Ingestion (§4.4), indicator computation (§4.5), and the data-source abstraction the trading
//! engine consumes (§4.8).

pub mod indicator_node;
pub mod ingestion;
pub mod source;

pub use indicator_node::IndicatorNodeHandler;
pub use ingestion::{Backoff, ExchangeAdapter, IngestionConfig, IngestionNode, LiveBarEvent};
pub use source::{DataSource, LiveDataSource, ReplayDataSource};
