//! Drives a `Conversation` against a relay
//!
//! One submit at a time: the session is borrowed mutably for the whole
//! stream. Cancellation drops the pending request or response body, which
//! releases the network operation, and settles the conversation as idle.

use super::state::{Conversation, ConversationError, StreamOutcome};
use crate::client::RelayClient;
use crate::relay::ChatRequest;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

pub struct ChatSession<C> {
    conversation: Conversation,
    client: C,
}

impl<C: RelayClient> ChatSession<C> {
    pub fn new(client: C) -> Self {
        Self {
            conversation: Conversation::new(),
            client,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Attach/detach go through here; submits go through [`Self::submit`].
    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Submit `text` and stream the reply into the conversation.
    ///
    /// `on_chunk` sees every fragment right after it is appended. Rejected
    /// submits (blank text, already streaming) return an error and change
    /// nothing; every accepted submit ends with the conversation idle.
    ///
    /// Dropping the returned future before it resolves counts as a
    /// cancellation: the conversation is settled as idle on drop.
    pub async fn submit(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
        mut on_chunk: impl FnMut(&str) + Send,
    ) -> Result<StreamOutcome, ConversationError> {
        let request = self.conversation.submit(text)?;
        let mut reply = PendingReply {
            conversation: &mut self.conversation,
        };
        let outcome = stream_reply(&self.client, &request, cancel, &mut reply, &mut on_chunk).await;
        reply.settle(&outcome);

        match &outcome {
            StreamOutcome::Completed => tracing::debug!("Reply completed"),
            StreamOutcome::Cancelled => tracing::info!("Reply cancelled"),
            StreamOutcome::Failed { message } => {
                tracing::warn!(error = %message, "Reply failed");
            }
        }
        Ok(outcome)
    }
}

/// The in-flight reply of one submit. Settles the conversation on drop if
/// the submit never reached [`PendingReply::settle`].
struct PendingReply<'a> {
    conversation: &'a mut Conversation,
}

impl PendingReply<'_> {
    fn append(&mut self, chunk: &str) {
        self.conversation.append_chunk(chunk);
    }

    fn settle(&mut self, outcome: &StreamOutcome) {
        self.conversation.finish(outcome);
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if self.conversation.is_streaming() {
            tracing::info!("Reply abandoned before it finished");
            self.conversation.finish(&StreamOutcome::Cancelled);
        }
    }
}

async fn stream_reply<C: RelayClient>(
    client: &C,
    request: &ChatRequest,
    cancel: &CancellationToken,
    reply: &mut PendingReply<'_>,
    on_chunk: &mut (impl FnMut(&str) + Send),
) -> StreamOutcome {
    let mut chunks = tokio::select! {
        biased;
        () = cancel.cancelled() => return StreamOutcome::Cancelled,
        result = client.send(request) => match result {
            Ok(chunks) => chunks,
            Err(e) => return StreamOutcome::Failed { message: e.to_string() },
        },
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return StreamOutcome::Cancelled,
            next = chunks.next() => match next {
                Some(Ok(chunk)) => {
                    reply.append(&chunk);
                    on_chunk(&chunk);
                }
                Some(Err(e)) => return StreamOutcome::Failed { message: e.to_string() },
                None => return StreamOutcome::Completed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChunkStream, RelayClientError};
    use crate::conversation::{Role, StreamState};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Reply {
        Chunks(Vec<&'static str>),
        ChunksThenHang(Vec<&'static str>),
        ChunksThenError(Vec<&'static str>, &'static str),
        Reject,
    }

    struct MockRelayClient {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockRelayClient {
        fn new(reply: Reply) -> Self {
            Self::with_replies(vec![reply])
        }

        fn with_replies(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    fn ok_chunks(chunks: Vec<&'static str>) -> Vec<Result<String, RelayClientError>> {
        chunks.into_iter().map(|c| Ok(c.to_string())).collect()
    }

    #[async_trait]
    impl RelayClient for MockRelayClient {
        async fn send(&self, request: &ChatRequest) -> Result<ChunkStream, RelayClientError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Chunks(vec![])) {
                Reply::Chunks(chunks) => Ok(futures::stream::iter(ok_chunks(chunks)).boxed()),
                Reply::ChunksThenHang(chunks) => Ok(futures::stream::iter(ok_chunks(chunks))
                    .chain(futures::stream::pending())
                    .boxed()),
                Reply::ChunksThenError(chunks, message) => {
                    let mut items = ok_chunks(chunks);
                    items.push(Err(RelayClientError::Stream(message.to_string())));
                    Ok(futures::stream::iter(items).boxed())
                }
                Reply::Reject => Err(RelayClientError::Rejected {
                    status: 500,
                    error: "Failed to process your request".into(),
                    details: Some("quota".into()),
                }),
            }
        }
    }

    #[tokio::test]
    async fn streamed_chunks_build_reply() {
        let mut session = ChatSession::new(MockRelayClient::new(Reply::Chunks(vec!["Hel", "lo"])));
        let mut seen = Vec::new();

        let outcome = session
            .submit("hi", &CancellationToken::new(), |c| seen.push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(seen, vec!["Hel", "lo"]);
        let conv = session.conversation();
        assert_eq!(conv.state(), StreamState::Idle);
        let last = conv.messages().last().unwrap();
        assert_eq!((last.role, last.content.as_str()), (Role::Assistant, "Hello"));
    }

    #[tokio::test]
    async fn cancel_mid_stream_keeps_delivered_chunks() {
        let mut session =
            ChatSession::new(MockRelayClient::new(Reply::ChunksThenHang(vec!["Hel", "lo"])));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut received = 0;

        let outcome = session
            .submit("hi", &cancel, |_| {
                received += 1;
                if received == 2 {
                    trigger.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert!(outcome.notice().is_none());
        let conv = session.conversation();
        assert_eq!(conv.state(), StreamState::Idle);
        assert_eq!(conv.messages().last().unwrap().content, "Hello");
    }

    #[tokio::test]
    async fn cancel_before_dispatch_answers() {
        let mut session = ChatSession::new(MockRelayClient::new(Reply::Chunks(vec!["never"])));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = session.submit("hi", &cancel, |_| {}).await.unwrap();

        assert_eq!(outcome, StreamOutcome::Cancelled);
        let conv = session.conversation();
        assert!(!conv.is_streaming());
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].role, Role::User);
    }

    #[tokio::test]
    async fn rejection_leaves_user_message_and_raises_notice() {
        let mut session = ChatSession::new(MockRelayClient::new(Reply::Reject));

        let outcome = session
            .submit("hi", &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        let notice = outcome.notice().unwrap();
        assert_eq!(
            notice.description,
            "Failed to send message: Failed to process your request (quota)"
        );
        let conv = session.conversation();
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].content, "hi");
        assert!(!conv.is_streaming());
    }

    #[tokio::test]
    async fn mid_stream_error_keeps_partial_reply() {
        let mut session = ChatSession::new(MockRelayClient::new(Reply::ChunksThenError(
            vec!["par", "tial"],
            "Request exceeded the 30s time budget",
        )));

        let outcome = session
            .submit("hi", &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        assert!(matches!(outcome, StreamOutcome::Failed { .. }));
        assert_eq!(session.conversation().messages().last().unwrap().content, "partial");
    }

    #[tokio::test]
    async fn blank_submit_never_reaches_client() {
        let client = MockRelayClient::new(Reply::Chunks(vec!["x"]));
        let mut session = ChatSession::new(client);

        let err = session
            .submit("   ", &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(err, ConversationError::EmptyMessage);
        assert!(session.client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn attached_document_travels_with_request() {
        let mut session = ChatSession::new(MockRelayClient::new(Reply::Chunks(vec!["ok"])));
        session
            .conversation_mut()
            .attach_document("report.pdf", "hello world")
            .unwrap();

        session
            .submit("what does it say?", &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        let requests = session.client.requests.lock().unwrap();
        assert_eq!(requests[0].pdf_content.as_deref(), Some("hello world"));
        let roles: Vec<_> = requests[0].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User]);
    }

    #[tokio::test]
    async fn dropped_submit_settles_conversation() {
        let mut session = ChatSession::new(MockRelayClient::with_replies(vec![
            Reply::ChunksThenHang(vec!["Hel"]),
            Reply::Chunks(vec!["again"]),
        ]));
        let cancel = CancellationToken::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            session.submit("hi", &cancel, |_| {}),
        )
        .await;
        assert!(abandoned.is_err());

        let conv = session.conversation();
        assert_eq!(conv.state(), StreamState::Idle);
        assert!(conv.in_flight().is_none());
        assert_eq!(conv.messages().last().unwrap().content, "Hel");

        let outcome = session.submit("hi again", &cancel, |_| {}).await.unwrap();
        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(session.conversation().messages().last().unwrap().content, "again");
    }
}
