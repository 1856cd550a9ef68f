//! Shared helpers for adapter integration tests.

#![allow(dead_code)]

use std::time::Duration;
use tagwire_adapters::ReaderEvent;
use tagwire_core::{ReaderError, Tag};
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(2);

pub async fn next_event(events: &mut UnboundedReceiver<ReaderEvent>) -> ReaderEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Next tag batch, skipping other events.
pub async fn next_tags(events: &mut UnboundedReceiver<ReaderEvent>) -> (String, Vec<Tag>) {
    loop {
        if let ReaderEvent::Tags { reader, tags } = next_event(events).await {
            return (reader, tags);
        }
    }
}

/// Next error, skipping other events.
pub async fn next_error(events: &mut UnboundedReceiver<ReaderEvent>) -> ReaderError {
    loop {
        if let ReaderEvent::Error { error, .. } = next_event(events).await {
            return error;
        }
    }
}

/// Errors already queued, without waiting.
pub fn queued_errors(events: &mut UnboundedReceiver<ReaderEvent>) -> Vec<ReaderError> {
    let mut errors = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ReaderEvent::Error { error, .. } = event {
            errors.push(error);
        }
    }
    errors
}
