use anyhow::Result;
use tracing::warn;

use crate::api::ChatStore;
use crate::realtime::{ChangeEvent, ChangeFeed, EventKind, Filter, Subscription};
use crate::timestamp;
use crate::types::{Message, NewMessage, Thread, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadsState {
    Loading,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagesState {
    Loading,
    Loaded,
}

struct ActivePane {
    thread_id: String,
    state: MessagesState,
    messages: Vec<Message>,
    subscription: Subscription,
}

/// Local view of one user's conversations, kept current by the change-feed.
///
/// At most one subscription is live per instance; selecting a thread
/// releases the previous one before the next is opened, so events from two
/// threads can never interleave in the message pane.
pub struct ChatCenter<S, F> {
    store: S,
    feed: F,
    user_id: String,
    role: UserRole,
    messages_table: String,
    threads: Vec<Thread>,
    threads_state: ThreadsState,
    active: Option<ActivePane>,
}

impl<S: ChatStore, F: ChangeFeed> ChatCenter<S, F> {
    pub fn new(
        store: S,
        feed: F,
        user_id: impl Into<String>,
        role: UserRole,
        messages_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            feed,
            user_id: user_id.into(),
            role,
            messages_table: messages_table.into(),
            threads: Vec::new(),
            threads_state: ThreadsState::Loading,
            active: None,
        }
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn threads_state(&self) -> ThreadsState {
        self.threads_state
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn active_thread_id(&self) -> Option<&str> {
        self.active.as_ref().map(|pane| pane.thread_id.as_str())
    }

    pub fn active_thread(&self) -> Option<&Thread> {
        let pane = self.active.as_ref()?;
        self.threads.iter().find(|t| t.id == pane.thread_id)
    }

    pub fn messages(&self) -> &[Message] {
        self.active
            .as_ref()
            .map(|pane| pane.messages.as_slice())
            .unwrap_or_default()
    }

    pub fn messages_state(&self) -> Option<MessagesState> {
        self.active.as_ref().map(|pane| pane.state)
    }

    /// One-shot load of the thread list. A failure is logged and settles on
    /// an empty loaded list; there is no retry.
    pub async fn load_threads(&mut self) {
        match self.store.list_threads(&self.user_id, self.role).await {
            Ok(threads) => self.threads = threads,
            Err(err) => warn!("chat: thread list load failed: {err:#}"),
        }
        self.threads_state = ThreadsState::Loaded;
    }

    /// Opens a thread: releases the previous subscription, subscribes to
    /// inserts scoped to this thread, then fetches the history ascending.
    /// A history failure leaves the pane in `MessagesLoading`.
    pub async fn select_thread(&mut self, thread_id: &str) -> Result<()> {
        self.active = None;

        let filter = Filter::eq("thread_id", thread_id);
        let subscription = self
            .feed
            .subscribe(&self.messages_table, filter, EventKind::Insert)?;
        self.active = Some(ActivePane {
            thread_id: thread_id.to_string(),
            state: MessagesState::Loading,
            messages: Vec::new(),
            subscription,
        });

        match self.store.list_messages(thread_id).await {
            Ok(messages) => {
                if let Some(pane) = self.active.as_mut() {
                    if pane.thread_id == thread_id {
                        pane.messages = messages;
                        pane.state = MessagesState::Loaded;
                    }
                }
            }
            Err(err) => {
                warn!("chat: message history load failed thread={thread_id}: {err:#}");
            }
        }
        Ok(())
    }

    pub fn deselect(&mut self) {
        self.active = None;
    }

    /// Awaits the next inbound event for the selected thread. Pends forever
    /// while no thread is selected; `None` means the feed shut down.
    pub async fn recv_event(&mut self) -> Option<ChangeEvent> {
        match self.active.as_mut() {
            Some(pane) => pane.subscription.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// Appends an inbound insert to the message pane. Rows are validated at
    /// the boundary; events are already scoped to the selected thread by the
    /// subscription filter, so there is no de-duplication or re-sort.
    pub fn apply_event(&mut self, event: ChangeEvent) {
        let Some(pane) = self.active.as_mut() else {
            return;
        };
        let message: Message = match serde_json::from_value(event.row) {
            Ok(message) => message,
            Err(err) => {
                warn!("chat: dropping malformed feed row: {err}");
                return;
            }
        };
        pane.messages.push(message);
    }

    /// Submits a message. The thread's last-activity timestamp bumps before
    /// the request resolves and is not rolled back on failure. The message
    /// itself is never appended locally; it arrives via the feed echo.
    pub async fn send(&mut self, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let Some(pane) = self.active.as_ref() else {
            return;
        };
        let thread_id = pane.thread_id.clone();

        let now = timestamp::now_iso();
        if let Some(thread) = self.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.last_message_at = Some(now);
        }

        let message = NewMessage {
            thread_id,
            sender_id: self.user_id.clone(),
            content: content.to_string(),
        };
        if let Err(err) = self.store.send_message(&message).await {
            warn!("chat: send failed thread={}: {err:#}", message.thread_id);
        }
    }

    /// Marks a thread inactive and drops it from the visible list. The pane
    /// and its subscription are released if the thread was open.
    pub async fn close_thread(&mut self, thread_id: &str) {
        if let Err(err) = self.store.close_thread(thread_id).await {
            warn!("chat: close failed thread={thread_id}: {err:#}");
            return;
        }
        if self
            .active
            .as_ref()
            .is_some_and(|pane| pane.thread_id == thread_id)
        {
            self.active = None;
        }
        if let Some(thread) = self.threads.iter_mut().find(|t| t.id == thread_id) {
            thread.is_active = false;
        }
        self.threads.retain(|t| t.is_active);
    }
}
