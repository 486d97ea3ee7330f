//! Shared CLI plumbing for the `j1708dump`/`j1708send` utilities: the
//! candump-style `--show`/`--hide` filter expressions.

pub mod filter;

pub use filter::FilterExpr;
