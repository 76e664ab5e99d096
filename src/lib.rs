//! # statsheet - Reactive Attribute Engine for Character Sheets
//!
//! A dependency-tracking numeric engine for tabletop character sheets:
//! - **Derived values** recompute automatically when anything they read changes
//! - **Overrides** pin any computed value to a manual number, and un-pin it again
//! - **Cycle-safe** wiring: an edge that would close a loop is rejected
//! - **Glitch-free** propagation: every affected value is recomputed once, in order
//!
//! ## Core Concepts
//!
//! ### Attributes
//!
//! Every attribute lives in a [`Sheet`] and is addressed by a [`NodeId`]:
//!
//! ```text
//! Scalar ─┐
//!         ├─> Modifier (base + offset) ─> Sum / Max / Min ─> ...
//! Scalar ─┘
//! ```
//!
//! 1. **Scalars** hold a stored number
//! 2. **Modifiers** add a base and an offset
//! 3. **Aggregates** reduce a dynamic item set (sum, max, min)
//! 4. **Conditional modifiers** use a sum of toggleable options as their offset
//! 5. **Unit proxies** show another attribute in a different unit
//!
//! ### Key Features
//!
//! - **Dependency Graph**: edges are stored once, so both directions stay in sync
//! - **Ownership**: satellite attributes die with their owner
//! - **Pause & Batch**: defer propagation while writing several fields
//! - **Subscribers**: observe changes after they have settled
//! - **Snapshots**: serializable views for display layers
//!
//! ## Example
//!
//! ```rust
//! use statsheet::*;
//!
//! let mut sheet = Sheet::new();
//! let base = sheet.create_scalar("Will base", 10.0);
//! let will = sheet.conditional_modifier("Will").base(base).build().unwrap();
//!
//! sheet.create_option(will, 2.0, "bonus", false).unwrap();
//! sheet.create_option(will, -1.0, "penalty", true).unwrap();
//! assert_eq!(sheet.value(will).unwrap(), 9.0);
//!
//! let bonus = sheet.option_at(will, 0).unwrap().unwrap();
//! sheet.set_selected(bonus, true).unwrap();
//! assert_eq!(sheet.value(will).unwrap(), 11.0);
//! ```
//!
//! ## Modules
//!
//! - [`sheet`] - The engine: propagation, pause, batch, edges, destruction
//! - [`node`] - Attribute handles and kinds
//! - [`modifier`] - Base + offset attributes
//! - [`aggregate`] - Sum / max / min over item sets
//! - [`conditional`] - Conditional modifiers and options
//! - [`unit`] - Unit conversions and proxies
//! - [`subscriber`] - Change observers
//! - [`snapshot`] - Serializable read views
//! - [`numeric`] - Value type and literal parsing
//! - [`error`] - Error types

pub mod aggregate;
pub mod conditional;
pub mod error;
mod graph;
pub mod modifier;
pub mod name;
pub mod node;
pub mod numeric;
mod scalar;
pub mod sheet;
pub mod snapshot;
pub mod subscriber;
pub mod unit;

// Re-export main types for convenience
pub use error::AttrError;
pub use name::AttrName;
pub use node::{AttrType, NodeId};
pub use sheet::{Sheet, UpdateFlags};
pub use snapshot::{AttrSnapshot, OptionSnapshot};

// Re-export attribute kinds
pub use aggregate::Reducer;
pub use conditional::ConditionalModifierBuilder;
pub use modifier::ModifierBuilder;
pub use unit::UnitConversion;

// Re-export observer and numeric types
pub use numeric::StatValue;
pub use subscriber::{ChangeEvent, Subscriber, SubscriberId};
