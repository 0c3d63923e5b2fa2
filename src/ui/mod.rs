//! Text styling and layout.
//!
//! - **style**: immutable [`Style`] blocks (colors, padding, size, border)
//! - **layout**: escape-aware width, truncation and block joining
//!
//! Everything here is pure: the same input always renders to the same
//! string.

pub mod layout;
pub mod style;

pub use layout::{join_columns, join_horizontal, join_vertical, truncate, truncate_with_ellipsis, visible_width};
pub use style::{Border, Color, Padding, Style};
