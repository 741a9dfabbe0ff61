//! Downstream HTTP access: per-credential VidCap clients and the
//! ScreenshotOne capture client.

pub mod cache;
pub mod client;
pub mod error;
pub mod query;
pub mod screenshot;
pub mod vidcap;

pub use cache::{ClientCache, DEFAULT_CAPACITY};
pub use client::{ApiClient, ClientConfig, DEFAULT_BASE_URL, REQUEST_TIMEOUT};
pub use error::{ApiError, AuthFailure};
pub use query::to_query_pairs;
pub use screenshot::{mime_type_for, normalize_url, Screenshot, ScreenshotApi, DEFAULT_SCREENSHOT_BASE_URL};
pub use vidcap::{Endpoint, VidcapApi};
