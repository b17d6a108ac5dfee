//! Horizon Index - Secondary index implementations for the Horizon engine.
//!
//! Tables keep one `HashIndex` per `secondary_key` column, mapping a cell value
//! to the primary keys of the live rows holding it.
//!
//! # Example
//!
//! ```rust
//! use horizon_index::{HashIndex, Index};
//!
//! let mut index: HashIndex<&str, u32> = HashIndex::new(false);
//! index.add("pending", 7).unwrap();
//! index.add("pending", 8).unwrap();
//! index.relocate(&"pending", "shipped", 7);
//!
//! assert_eq!(index.get(&"pending"), vec![8]);
//! assert_eq!(index.get(&"shipped"), vec![7]);
//! ```

#![no_std]

extern crate alloc;

pub mod hash;
pub mod traits;

pub use hash::HashIndex;
pub use traits::{Index, IndexError};
