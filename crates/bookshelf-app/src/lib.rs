// Front-end state for the bookshelf client: the auth session and the
// chat composer that reads the reader's selection.

pub mod chat;
pub mod session;

pub use chat::ChatComposer;
pub use session::{
    AuthError, Session, SessionAction, SessionManager, SessionStatus, StorageSync,
    SubscriptionId,
};
