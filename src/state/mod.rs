pub mod bus;
pub mod store;

pub use bus::EventBus;
pub use store::{StateStore, Subscription};
