pub mod chat;

pub use chat::{
    messages_collection, messages_query, threads_collection, threads_query, unread_count, ChatService,
    CHATS, MESSAGES,
};
