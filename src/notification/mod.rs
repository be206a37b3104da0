pub mod message;

pub use message::MessageClient;
