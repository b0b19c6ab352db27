pub mod analysis;
pub mod audio;
pub mod credential;
pub mod events;
pub mod session;
mod content;

pub use content::items::{ItemContent, ItemResource, ItemStatus};
pub use content::message::MessageRole;
pub use events::{ClientEvent, ServerEvent};
pub use session::Session;
