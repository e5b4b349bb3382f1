//! Tile spec identifiers and spec list parsing.
//!
//! A spec list is the comma-separated string persisted per principal, e.g.
//! `"wifi, bt,default,intent(com.example.TOGGLE)"`. Parsing is infallible:
//! tokens that do not name a known tile are rejected later, at factory
//! dispatch.

mod parse;
mod spec;

pub use parse::{DEFAULT_SENTINEL, parse_spec_list, split_specs};
pub use spec::TileSpec;
