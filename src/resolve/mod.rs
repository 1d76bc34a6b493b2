//! The resolution pipeline: resolver contract, dispatch, aggregation and the
//! per-message service.

pub mod collection;
pub mod contract;
pub mod links;
pub mod registry;
pub mod service;
pub mod types;

pub use collection::{ResultCollection, ResultItem};
pub use contract::{check_variants, follow_short_link, Resolver};
pub use links::{find_links, normalize_spans, strip_spans};
pub use registry::{dispatch_one, ResolverRegistry};
pub use service::{MessageResolutionService, ResolveOptions};
pub use types::{LinkSpan, MatchContext, NotSupported, ResolveFailure, ResolverError};
