pub mod cursor;
pub mod descriptor;
pub mod filter;

pub use cursor::{DiscoveryCursor, IdCursor, PageCursor, Reservation};
pub use descriptor::{id_from_url, QualityLabel, ResourceDescriptor, UrlTemplates};
pub use filter::{AiFilter, FilterParams, SortMode};
