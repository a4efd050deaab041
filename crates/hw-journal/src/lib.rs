//! hw-journal: the hellowords journal engine
//!
//! Ties the codec, the stores and the embedding client together:
//!   - `writer`: plaintext → encrypted, hashed, embedded record → one store write
//!   - `pending`: entries composed while signed out, flushed once on sign-in
//!   - `draft`: continuous mirror of the unsaved composition
//!   - `search`: embed query, match server-side, decrypt each hit locally
//!   - `journal`: the facade front ends drive

pub mod auth;
pub mod draft;
pub mod journal;
pub mod location;
pub mod pending;
pub mod search;
pub mod writer;

pub use auth::{Account, ActiveSession, AuthProvider, LocalAuth};
pub use draft::{DraftPersistence, ReloadDetector, TeardownGapDetector};
pub use journal::{Journal, OpenedEntry, SaveOutcome};
pub use location::{locate_with_timeout, LocationPreference, Locator, StaticLocator};
pub use pending::{FlushOutcome, PendingEntry, PendingEntryCoordinator, PendingState};
pub use search::{SearchOptions, SearchPipeline};
pub use writer::EntryWriter;
