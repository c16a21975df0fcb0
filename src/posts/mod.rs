pub mod aggregation;
pub mod domain;
pub mod mutation;
pub mod query;
pub mod repository;

pub use domain::{NewPost, PageRequest, PostChanges, PostResponse, PostWriter};
pub use mutation::PostMutationService;
pub use query::PostQueryService;
