//! Database models.

pub mod attachment;
pub mod post;
pub mod setting;
pub mod term;
pub mod user;

pub use attachment::Attachment;
pub use post::{NewPost, Post, PostStatus};
pub use setting::Setting;
pub use term::{Taxonomy, Term};
pub use user::{CreateUser, User};
