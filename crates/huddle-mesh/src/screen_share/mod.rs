//! Screen-share overlay: one-to-many video on its own connections.
//!
//! The sharer keeps one outbound-only edge per subscriber; a viewer keeps
//! one inbound-only edge per sharer it watches. Neither touches the mesh
//! connections, and the viewer never offers.

mod sharer;
mod types;
mod viewer;

pub use sharer::ScreenSharer;
pub use types::ShareEdge;
pub use viewer::ScreenViewer;

#[cfg(test)]
mod tests;
