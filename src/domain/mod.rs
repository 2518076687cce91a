pub mod entry;
pub mod feed;
pub mod resource;
pub mod subscription;

pub use entry::FeedEntry;
pub use feed::FeedSource;
pub use resource::BinaryResource;
pub use subscription::SubscriberKey;
