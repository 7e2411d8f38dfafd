/// Business logic layer for blog-service
///
/// The service sits between the API layer and the stores: it stamps
/// timestamps, enforces post-level rules, serializes comment creation per post
/// and feeds the comment subscription fanout.
pub mod blog;

pub use blog::{BlogService, DEFAULT_MAX_PAGE_SIZE};
