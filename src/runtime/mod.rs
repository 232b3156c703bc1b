pub mod controller;
pub mod events;
pub mod feed;

pub use controller::RunController;
pub use events::RunEvent;
pub use feed::FixFeed;
