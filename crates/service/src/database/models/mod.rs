mod attachment;
mod message;
mod recipient;
mod user;

pub use attachment::Attachment;
pub use message::{InboxRow, Message};
pub use recipient::Recipient;
pub use user::{NewUser, User};
