//! Query engine for activation records held behind eventually consistent
//! views.
//!
//! A request flows through validation, authorization, translation onto a
//! view, and projection. [`ActivationQueries::query_once`] answers from the
//! current refresh state; [`retry_until`] lets callers wait out staleness.

pub mod authz;
pub mod engine;
pub mod error;
pub mod project;
pub mod retry;
pub mod spec;
pub mod translate;
pub mod validate;

pub use authz::{authorize, Identity};
pub use engine::{ActivationQueries, QueryOutput};
pub use error::{QueryError, CORRUPTED_ENTITY};
pub use retry::{retry_until, Backoff, RetryError, RetryPolicy};
pub use spec::{
    ListLimits, ListParams, OutputMode, QuerySpec, SubResource, COLLECTION, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT,
};
pub use translate::{translate, QueryPlan};
pub use validate::{validate_get, validate_id, validate_list, validate_namespace};
