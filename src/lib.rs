//! Inventory manager for physical storage containers.
//!
//! Each container gets a short typed or scanned id (`C-XXXX`), a label,
//! a location and notes, plus any number of photos with thumbnails.
//! The whole inventory can be exported to a single backup archive and
//! restored from it.
//!
//! ```no_run
//! use boxkeep::{ContainerDraft, Inventory, InventoryConfig};
//!
//! # fn main() -> boxkeep::Result<()> {
//! let mut inventory = Inventory::open(&InventoryConfig::default())?;
//! let tools = inventory.add_container(ContainerDraft {
//!     id: Some("c-ab12".into()),
//!     label: "Tools".into(),
//!     ..Default::default()
//! })?;
//! assert_eq!(tools.id, "C-AB12");
//! let backup = inventory.export()?;
//! inventory.import(&backup)?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod ident;
pub mod inventory;
pub mod media;
pub mod search;
pub mod state;

pub use config::InventoryConfig;
pub use error::{InventoryError, Result};
pub use inventory::{ContainerDraft, Inventory, NewPhoto};
pub use state::{Container, Photo, PhotoMeta, RecordStore, RemoteStore, SqliteStore};
