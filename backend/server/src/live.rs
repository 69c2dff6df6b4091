//! # Live Feed
//!
//! Fire-and-forget relay of vote announcements to every connected viewer.
//! Viewers subscribe over Server-Sent Events, the UI listens for the
//! `VoteMessage` event and shows each message as a toast.
//!
//! Publishing never affects the outcome of a vote. Slow viewers that fall
//! behind the channel buffer skip the messages they missed.
use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use tracing::debug;

use crate::{
    models::{Mood, UNKNOWN_COUNTRY},
    state::State as AppState,
};

pub const VOTE_EVENT: &str = "VoteMessage";

pub fn vote_message(country: &str, mood: Mood) -> String {
    let origin = if country == UNKNOWN_COUNTRY {
        "somewhere"
    } else {
        country
    };

    format!("Someone from {origin} is feeling {mood} today")
}

#[derive(Clone)]
pub struct LiveFeed {
    sender: broadcast::Sender<String>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, country: &str, mood: Mood) {
        let message = vote_message(country, mood);

        match self.sender.send(message) {
            Ok(viewers) => debug!("Vote message sent to {viewers} viewer(s)"),
            Err(_) => debug!("No live viewers, vote message dropped"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

pub async fn live_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.live.subscribe())
        .filter_map(|message| message.ok())
        .map(|text| Ok::<_, Infallible>(Event::default().event(VOTE_EVENT).data(text)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
