//! Global colors.

use nu_ansi_term::Color;

/// The attention color (errors, instructions, dry-run markers).
pub(crate) const ATTENTION_COLOR: Color = Color::Red;

/// The information color (library versions).
pub(crate) const INFO_COLOR: Color = Color::Cyan;

/// The color used to colorise the path.
pub(crate) const PATH_COLOR: Color = Color::LightBlue;

/// The color used to colorise download URLs.
pub(crate) const URL_COLOR: Color = Color::LightPurple;
