// ABOUTME: Persistence layer for partshelf, owning the on-disk library tree.
// ABOUTME: Provides the processed-ID ledger, artifact organizer, retention sweeper, and instance selection.

pub mod layout;
pub mod ledger;
pub mod listing;
pub mod locks;
pub mod organizer;
pub mod paths;
pub mod selector;
pub mod sweeper;

pub use layout::{LEDGER_FILE_NAME, LibraryDirs};
pub use ledger::{Ledger, LedgerError};
pub use listing::{DirEntry, DirectoryListing, ListingError, list_directory};
pub use locks::LibraryLocks;
pub use organizer::{ArtifactPaths, CleanupReport, OrganizeReport, StepStatus, organize};
pub use paths::{PathError, resolve_within};
pub use selector::{LibraryInstance, SelectorError, create_instance, list_instances, resolve_active, select_active};
pub use sweeper::{RetentionPolicy, SweepReport, Sweeper, SweeperHandle, sweep_once};
