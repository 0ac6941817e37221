//! Gateway services: the publish pipeline and remote image sideloading.

pub mod publisher;
pub mod sideload;

pub use publisher::{PublishRequest, PublishResponse, PublishService};
pub use sideload::{FeaturedImageOutcome, SideloadService};
