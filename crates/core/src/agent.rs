//! Reasoner trait: the seam between the chat session and whatever decides
//! how to answer.
//!
//! A reasoner receives the whole transcript and returns it extended with any
//! intermediate tool-call and tool-result entries, ending with the final
//! assistant message. The session only keeps that last message.

use async_trait::async_trait;
use crate::error::Result;
use crate::message::Message;

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Produce a response for the given transcript.
    ///
    /// The returned sequence must end with the final assistant message.
    async fn respond(&self, transcript: &[Message]) -> Result<Vec<Message>>;
}
