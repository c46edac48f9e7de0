pub mod clock;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod live;
pub mod protocol;
pub mod summary;
