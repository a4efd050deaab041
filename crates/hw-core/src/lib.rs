pub mod config;
pub mod error;
pub mod types;

pub use error::{HwError, HwResult};
pub use types::{
    word_count, Entry, NewEntry, SearchHit, DECRYPTION_FAILED_PLACEHOLDER,
    LIST_DECRYPTION_FAILED_PLACEHOLDER, LOCATION_UNAVAILABLE, NO_LOCATION_SAVED,
};
