pub mod backends;

pub use backends::*;

pub mod prelude {
    pub use super::backends::*;
    pub use md_core::{Article, ArticleStore, Result, StoreStats};
}
