pub mod resolver;
pub mod report;

pub use resolver::{Dedup, Hydrate, RelationFilter, Resolver};
pub use report::{EmailEntry, LeakReport, LeakService, LeakStream};
