//! Tests for the screen-share overlay, both sides.

use std::sync::Arc;

use huddle_common::{IceCandidate, NegotiationError, SdpType, SessionDescription, TrackKind};
use tokio::sync::mpsc;

use super::*;
use crate::testing::{Call, FakeBackend, FakeCapture};
use crate::transport::{Direction, TaggedEvent};

/// Transport events are not inspected here; the pumps just stop.
fn sink() -> mpsc::UnboundedSender<TaggedEvent> {
    mpsc::unbounded_channel().0
}

fn candidate(c: &str) -> IceCandidate {
    IceCandidate {
        candidate: c.into(),
        sdp_mid: Some("0".into()),
        sdp_mline_index: Some(0),
    }
}

#[tokio::test]
async fn subscription_flow_end_to_end() {
    let sharer_backend = FakeBackend::default();
    let viewer_backend = FakeBackend::default();
    let (capture, control) = FakeCapture::new();
    let (mut sharer, ended) =
        ScreenSharer::new(Arc::new(sharer_backend.clone()), Vec::new(), sink(), Box::new(capture));
    assert!(ended.is_some());
    let mut viewer = ScreenViewer::new(Arc::new(viewer_backend.clone()), Vec::new(), sink());

    // 1. viewer -> screen-subscribe
    assert!(viewer.subscribe("sharer"));
    // 2. sharer -> screen-offer
    let offer = sharer.add_subscriber("viewer").await.unwrap();
    assert_eq!(offer.sdp_type, SdpType::Offer);
    let out = sharer_backend.last();
    assert_eq!(out.direction, Direction::SendOnly);
    assert_eq!(out.sending_kind(TrackKind::Video), [control.track.clone()]);
    // 3. viewer -> screen-answer
    let answer = viewer.handle_offer("sharer", offer).await.unwrap();
    let inbound = viewer_backend.last();
    assert_eq!(inbound.direction, Direction::RecvOnly);
    assert_eq!(inbound.offers(), 0);
    assert!(inbound.sending().is_empty());
    sharer.handle_answer("viewer", answer).await.unwrap();
    // 4. screen-ice both ways
    assert!(sharer.add_ice_candidate("viewer", candidate("v1")).await);
    assert!(viewer.add_ice_candidate("sharer", candidate("s1")).await);
    assert_eq!(out.count(|c| *c == Call::AddIce("v1".into())), 1);
    assert_eq!(inbound.count(|c| *c == Call::AddIce("s1".into())), 1);

    assert!(sharer.has_subscriber("viewer"));
    assert!(viewer.is_subscribed("sharer"));
}

#[tokio::test]
async fn subscribe_and_unsubscribe_are_idempotent() {
    let backend = FakeBackend::default();
    let mut viewer = ScreenViewer::new(Arc::new(backend), Vec::new(), sink());
    assert!(viewer.subscribe("s"));
    assert!(!viewer.subscribe("s"));
    assert!(viewer.unsubscribe("s"));
    assert!(!viewer.unsubscribe("s"));
    assert!(!viewer.unsubscribe("never"));
}

#[tokio::test]
async fn unsubscribe_closes_edge() {
    let backend = FakeBackend::default();
    let mut viewer = ScreenViewer::new(Arc::new(backend.clone()), Vec::new(), sink());
    viewer.subscribe("s");
    viewer
        .handle_offer("s", SessionDescription::offer("o"))
        .await
        .unwrap();
    assert_eq!(backend.open_count(), 1);
    viewer.unsubscribe("s");
    assert_eq!(backend.open_count(), 0);
}

#[tokio::test]
async fn unsolicited_offer_is_refused() {
    let backend = FakeBackend::default();
    let mut viewer = ScreenViewer::new(Arc::new(backend.clone()), Vec::new(), sink());
    let err = viewer
        .handle_offer("stranger", SessionDescription::offer("o"))
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::UnknownEdge(_)));
    assert!(backend.connections().is_empty());
}

#[tokio::test]
async fn repeated_offer_replaces_viewer_edge() {
    let backend = FakeBackend::default();
    let mut viewer = ScreenViewer::new(Arc::new(backend.clone()), Vec::new(), sink());
    viewer.subscribe("s");
    viewer.handle_offer("s", SessionDescription::offer("1")).await.unwrap();
    viewer.handle_offer("s", SessionDescription::offer("2")).await.unwrap();
    let conns = backend.connections();
    assert_eq!(conns.len(), 2);
    assert!(conns[0].is_closed());
    assert!(!conns[1].is_closed());
}

#[tokio::test]
async fn resubscribe_replaces_stale_sharer_edge() {
    let backend = FakeBackend::default();
    let (capture, _control) = FakeCapture::new();
    let (mut sharer, _) =
        ScreenSharer::new(Arc::new(backend.clone()), Vec::new(), sink(), Box::new(capture));
    sharer.add_subscriber("v").await.unwrap();
    sharer.add_subscriber("v").await.unwrap();
    assert_eq!(backend.connections().len(), 2);
    assert_eq!(backend.open_count(), 1);
    assert_eq!(sharer.subscribers().count(), 1);
}

#[tokio::test]
async fn answer_for_unknown_subscriber_is_an_error() {
    let backend = FakeBackend::default();
    let (capture, _control) = FakeCapture::new();
    let (sharer, _) = ScreenSharer::new(Arc::new(backend), Vec::new(), sink(), Box::new(capture));
    let err = sharer
        .handle_answer("ghost", SessionDescription::answer("a"))
        .await
        .unwrap_err();
    assert!(matches!(err, NegotiationError::UnknownEdge(ref id) if id == "ghost"));
    assert!(!sharer.add_ice_candidate("ghost", candidate("x")).await);
}

#[tokio::test]
async fn stop_closes_edges_and_capture() {
    let backend = FakeBackend::default();
    let (capture, control) = FakeCapture::new();
    let (mut sharer, _) =
        ScreenSharer::new(Arc::new(backend.clone()), Vec::new(), sink(), Box::new(capture));
    sharer.add_subscriber("a").await.unwrap();
    sharer.add_subscriber("b").await.unwrap();
    assert!(sharer.remove_subscriber("a"));
    assert!(!sharer.remove_subscriber("a"));

    sharer.stop();
    assert_eq!(backend.open_count(), 0);
    assert!(control.is_stopped());
}

#[tokio::test]
async fn viewer_close_forgets_sharer_silently() {
    let backend = FakeBackend::default();
    let mut viewer = ScreenViewer::new(Arc::new(backend.clone()), Vec::new(), sink());
    viewer.subscribe("s");
    viewer.handle_offer("s", SessionDescription::offer("o")).await.unwrap();
    assert!(viewer.close("s"));
    assert!(!viewer.is_subscribed("s"));
    assert_eq!(backend.open_count(), 0);
    // A later unsubscribe has nothing to announce.
    assert!(!viewer.unsubscribe("s"));
}
