//! Thread/session synchronization between the local timeline and the backend.
//!
//! Every operation does its local side effects synchronously and hands back a
//! [`Request`]: a `'static` future the caller can await inline or spawn onto the
//! runtime. Its [`Completion`] is then fed to [`SessionClient::apply`] on the
//! same task that owns the client, so state is only ever mutated from one place.
//! Completions carry the generation they were issued under; anything issued
//! before the timeline was last replaced is discarded as stale.

use crate::api::{Backend, ChatReply, ChatRequest, TokenUsage};
use crate::error::{ClientError, ErrorKind, Result};
use crate::history::{ChatMessage, Thread};
use crate::render::{token_label, Surface, ThreadEntry, ThreadsView, SEND_FAILED_NOTICE};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub type Request = Pin<Box<dyn Future<Output = Completion> + Send + 'static>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub enum Completion {
    Sent {
        ticket: Ticket,
        /// Thread the message was sent on, `None` for a first turn.
        thread_id: Option<String>,
        result: Result<ChatReply>,
    },
    ThreadsListed {
        ticket: Ticket,
        result: Result<Vec<String>>,
    },
    ThreadLoaded {
        ticket: Ticket,
        thread_id: String,
        result: Result<Thread>,
    },
}

/// Whether a successful completion changed what is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Current,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoThread,
    ActiveThread,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSessionState {
    pub thread_id: Option<String>,
    pub timeline: Vec<ChatMessage>,
    pub tokens_used: u64,
}

impl ClientSessionState {
    pub fn phase(&self) -> SessionPhase {
        match self.thread_id {
            Some(_) => SessionPhase::ActiveThread,
            None => SessionPhase::NoThread,
        }
    }
}

/// The saved-threads pane contents, unique by thread id.
#[derive(Debug, Clone, Default)]
pub struct SavedThreads {
    entries: Vec<ThreadEntry>,
}

impl SavedThreads {
    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.entries.iter().any(|e| e.thread_id == thread_id)
    }

    fn replace(&mut self, thread_ids: &[String]) {
        self.entries.clear();
        for id in thread_ids {
            if !self.contains(id) {
                let position = self.entries.len() + 1;
                self.entries.push(ThreadEntry::listed(position, id));
            }
        }
    }

    fn upsert(&mut self, thread_id: &str) -> bool {
        if self.contains(thread_id) {
            return false;
        }
        self.entries.push(ThreadEntry::adopted(thread_id));
        true
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolves a 1-based position or a literal thread id.
    pub fn resolve(&self, selector: &str) -> Option<&str> {
        let selector = selector.trim();
        if let Some(entry) = self.entries.iter().find(|e| e.thread_id == selector) {
            return Some(&entry.thread_id);
        }
        selector
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.entries.get(i))
            .map(|e| e.thread_id.as_str())
    }
}

pub struct SessionClient<S> {
    backend: Arc<dyn Backend>,
    surface: S,
    state: ClientSessionState,
    saved: SavedThreads,
    timeline_generation: u64,
    listing_generation: u64,
}

impl<S: Surface> SessionClient<S> {
    pub fn new(backend: Arc<dyn Backend>, mut surface: S) -> Self {
        surface.set_token_usage(&token_label(Some(0)));
        Self {
            backend,
            surface,
            state: ClientSessionState::default(),
            saved: SavedThreads::default(),
            timeline_generation: 0,
            listing_generation: 0,
        }
    }

    pub fn state(&self) -> &ClientSessionState {
        &self.state
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.state.thread_id.as_deref()
    }

    pub fn saved_threads(&self) -> &SavedThreads {
        &self.saved
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn timeline_ticket(&self) -> Ticket {
        Ticket {
            generation: self.timeline_generation,
        }
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.surface.append_block(message.side(), &message.content);
        self.state.timeline.push(message);
    }

    /// Renders `text` immediately and returns the request that delivers it.
    pub fn send_message(&mut self, text: &str) -> Result<Request> {
        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        self.push_message(ChatMessage::user(text));
        self.surface.clear_input();

        let request = ChatRequest {
            message: text.to_string(),
            thread_id: self.state.thread_id.clone(),
        };
        let ticket = self.timeline_ticket();
        let backend = Arc::clone(&self.backend);
        debug!(thread_id = ?request.thread_id, generation = ticket.generation, "Sending message");

        Ok(Box::pin(async move {
            let result = backend.send_turn(&request).await;
            Completion::Sent {
                ticket,
                thread_id: request.thread_id,
                result,
            }
        }))
    }

    pub fn load_saved_threads(&mut self) -> Request {
        self.listing_generation += 1;
        let ticket = Ticket {
            generation: self.listing_generation,
        };
        let backend = Arc::clone(&self.backend);

        Box::pin(async move {
            let result = backend.list_threads().await;
            Completion::ThreadsListed { ticket, result }
        })
    }

    /// Supersedes any load or send still in flight.
    pub fn load_thread(&mut self, thread_id: &str) -> Request {
        self.timeline_generation += 1;
        let ticket = self.timeline_ticket();
        let thread_id = thread_id.to_string();
        let backend = Arc::clone(&self.backend);
        info!(%thread_id, generation = ticket.generation, "Loading thread");

        Box::pin(async move {
            let result = backend.load_thread(&thread_id).await;
            Completion::ThreadLoaded {
                ticket,
                thread_id,
                result,
            }
        })
    }

    /// Loads the saved thread at a 1-based position, or by id.
    pub fn select_thread(&mut self, selector: &str) -> Option<Request> {
        let thread_id = self.saved.resolve(selector)?.to_string();
        Some(self.load_thread(&thread_id))
    }

    pub fn start_new_thread(&mut self) {
        self.timeline_generation += 1;
        self.state = ClientSessionState::default();
        self.surface.clear_blocks();
        self.surface.set_token_usage(&token_label(Some(0)));
        info!(generation = self.timeline_generation, "Started new thread");
    }

    pub fn update_saved_threads(&mut self, thread_id: &str) {
        if self.saved.upsert(thread_id) {
            debug!(%thread_id, "Registered thread");
        }
        self.surface
            .show_threads(ThreadsView::Entries(self.saved.entries()));
    }

    /// Awaits `request` and reconciles its completion.
    pub async fn complete(&mut self, request: Request) -> Result<Applied> {
        let completion = request.await;
        self.apply(completion)
    }

    pub fn apply(&mut self, completion: Completion) -> Result<Applied> {
        match completion {
            Completion::Sent {
                ticket,
                thread_id,
                result,
            } => self.apply_sent(ticket, thread_id, result),
            Completion::ThreadsListed { ticket, result } => self.apply_listing(ticket, result),
            Completion::ThreadLoaded {
                ticket,
                thread_id,
                result,
            } => self.apply_loaded(ticket, thread_id, result),
        }
    }

    fn apply_sent(
        &mut self,
        ticket: Ticket,
        sent_on: Option<String>,
        result: Result<ChatReply>,
    ) -> Result<Applied> {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                // Still surfaced when the timeline has since been replaced: the
                // user's message was lost either way. Nothing on screen changes.
                let stale = ticket != self.timeline_ticket();
                match e.kind() {
                    ErrorKind::Application => warn!(stale, "Backend rejected message: {}", e),
                    _ => error!(stale, "Error sending message: {}", e),
                }
                let notice = match &e {
                    ClientError::Application(message) => message.as_str(),
                    _ => SEND_FAILED_NOTICE,
                };
                self.surface.notify(notice);
                return Err(e);
            }
        };

        // The reply belongs to whichever thread it was sent on, or the one the
        // server names; a timeline showing any other thread must not absorb it.
        let reply_thread = reply.thread_id.as_ref().or(sent_on.as_ref());
        let foreign = match (&self.state.thread_id, reply_thread) {
            (Some(current), Some(owner)) => current != owner,
            (Some(_), None) => true,
            (None, _) => sent_on.is_some(),
        };
        if ticket != self.timeline_ticket() || foreign {
            // The thread still exists server-side even if its timeline is gone.
            if let Some(id) = reply_thread.cloned() {
                self.update_saved_threads(&id);
            }
            info!(
                generation = ticket.generation,
                current = self.timeline_generation,
                sent_on = ?sent_on,
                reply_thread = ?reply.thread_id,
                showing = ?self.state.thread_id,
                "Discarding reply for a timeline no longer on screen"
            );
            return Ok(Applied::Stale);
        }

        self.push_message(ChatMessage::assistant(reply.response));
        match reply.tokens_used {
            TokenUsage::Count(n) => {
                self.state.tokens_used = n;
                self.surface.set_token_usage(&token_label(Some(n)));
            }
            TokenUsage::Unknown => self.surface.set_token_usage(&token_label(None)),
        }

        if self.state.thread_id.is_none() {
            match reply.thread_id {
                Some(id) => {
                    info!(thread_id = %id, "Adopted thread");
                    self.state.thread_id = Some(id);
                }
                None => warn!("Reply carried no thread_id; staying without a thread"),
            }
        }
        if let Some(id) = self.state.thread_id.clone() {
            self.update_saved_threads(&id);
        }
        Ok(Applied::Current)
    }

    fn apply_listing(&mut self, ticket: Ticket, result: Result<Vec<String>>) -> Result<Applied> {
        if ticket.generation != self.listing_generation {
            debug!(generation = ticket.generation, "Discarding superseded thread listing");
            return Ok(Applied::Stale);
        }

        match result {
            Ok(thread_ids) if thread_ids.is_empty() => {
                info!("No threads found");
                self.saved.clear();
                self.surface.show_threads(ThreadsView::Empty);
                Ok(Applied::Current)
            }
            Ok(thread_ids) => {
                debug!(count = thread_ids.len(), "Retrieved threads");
                self.saved.replace(&thread_ids);
                self.surface
                    .show_threads(ThreadsView::Entries(self.saved.entries()));
                Ok(Applied::Current)
            }
            Err(e) => {
                error!(kind = ?e.kind(), "Error loading threads: {}", e);
                self.saved.clear();
                self.surface.show_threads(ThreadsView::LoadError);
                Err(e)
            }
        }
    }

    fn apply_loaded(
        &mut self,
        ticket: Ticket,
        thread_id: String,
        result: Result<Thread>,
    ) -> Result<Applied> {
        if ticket != self.timeline_ticket() {
            debug!(
                %thread_id,
                generation = ticket.generation,
                failed = result.is_err(),
                "Discarding stale thread load"
            );
            return Ok(Applied::Stale);
        }

        let thread = match result {
            Ok(thread) => thread,
            Err(e) => {
                error!(%thread_id, kind = ?e.kind(), "Error loading thread: {}", e);
                return Err(e);
            }
        };

        self.surface.clear_blocks();
        self.state.timeline.clear();
        for message in thread.messages {
            self.push_message(message);
        }
        self.state.thread_id = Some(thread_id);
        Ok(Applied::Current)
    }
}
