//! Activation record storage: the `ActivationStore` trait, record and path
//! types, view keys, and an in-memory backend with asynchronously refreshed
//! views.

pub mod conformance;
mod error;
mod id;
mod memory;
mod path;
mod record;
mod traits;
mod view;

pub use error::StoreError;
pub use id::{ActivationId, IdError, ACTIVATION_ID_LENGTH};
pub use memory::MemoryStore;
pub use path::{
    is_valid_segment, qualified_name, NameFilter, Namespace, PathError, MAX_NAME_SEGMENTS,
};
pub use record::{
    ActivationRecord, ActivationResponse, Annotation, ResponseStatus, PATH_ANNOTATION,
};
pub use traits::ActivationStore;
pub use view::{IndexEntry, RangeQuery, TimeWindow, ViewKey};
