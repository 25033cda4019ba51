//! Rate-limited browser navigation
//!
//! The navigation counterpart of [`crate::fetch`]: page loads are queued on a
//! dispatcher whose pooled resource is a browser context, and each load is
//! bounded by the navigation timeout.

mod browser;
mod handler;

pub use browser::{Page, WebDriverContext, WebDriverPage};
pub use handler::NavigationHandler;
