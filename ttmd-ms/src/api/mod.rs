//! HTTP API for the mirror server
//!
//! Everything here speaks JSON except the raw file bytes served out of
//! the working copy. There is no authentication; this is an open
//! mirror.

mod browse;
mod contributors;
mod health;
mod logview;
mod stats;
mod status;
mod table;

pub use browse::{serve_mirror_path, serve_mirror_root};
pub use contributors::contributors;
pub use health::health_routes;
pub use logview::api_log;
pub use stats::{ncm_dashboard, ncm_no_lyrics, ncm_ranking};
pub use status::api_status;
pub use table::get_table_data;
