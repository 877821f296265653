//! GMP client for openvas-sync.
//!
//! Talks the Greenbone Management Protocol to gvmd over its Unix socket:
//! authenticate, list reports, and fetch one report rendered in a given
//! report format.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error type (`GmpClientError`)
//! - [`envelope`]: Response document tree (`Envelope`, `Element`)
//! - [`command`]: Request serialization (`GmpCommand`) and report id validation
//! - [`connection`]: Connection provider (`GmpConnector`) and session (`GmpSession`)
//! - [`source`]: Transport abstraction used by ingestion (`ReportSource`)
//!
//! # Architecture
//!
//! ```text
//! GmpConnector --connect+authenticate--> GmpSession
//!                                            |
//!                              ReportSource (trait)
//!                                 |               |
//!                       list_report_ids   fetch_report_envelope
//!                                 |               |
//!                              Envelope (quick-xml tree)
//! ```

pub mod command;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod source;

// --- Public API Re-exports ---

pub use command::{GmpCommand, validate_report_id};
pub use connection::{GmpClientConfig, GmpConnector, GmpSession};
pub use envelope::{Element, Envelope, EnvelopeError};
pub use error::GmpClientError;
pub use source::ReportSource;
