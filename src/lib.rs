//! modpatch: structural patches for hierarchical game documents.
//!
//! The crate provides:
//! - A document tree and its binary codec (`document`)
//! - Tree diff/apply with a typed patch model (`patch`, `handler`)
//! - Dense changelogs for record-table documents (`gdl`)
//! - Vanilla detection over a fingerprint index (`vanilla`)
//! - Archive listings, their location cache and compression (`archive`, `compress`)
//! - Package, merge and assemble operations over mod trees (`overlay`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use modpatch::document::Document;
//! use modpatch::patch;
//!
//! let reference: Document = [("a", 1), ("b", 2)].into_iter().collect();
//! let modified: Document = [("a", 1), ("b", 3)].into_iter().collect();
//!
//! let delta = patch::diff(&reference, &modified);
//! assert_eq!(patch::apply(&reference, &delta), modified);
//! ```

pub mod archive;
pub mod compress;
pub mod config;
pub mod document;
pub mod gdl;
pub mod handler;
pub mod io;
pub mod lazy;
pub mod overlay;
pub mod patch;
pub mod vanilla;
pub mod wire;

#[cfg(feature = "cli")]
pub mod cli;
