use crate::integration::{create_test_meeting, establish_inbound, roster_entry, settle};
use crate::utils::{Behavior, SessionScript};
use huddle_core::PeerId;
use huddle_engine::{DisconnectReason, MeetingCommand, SignalingPhase};

#[tokio::test(start_paused = true)]
async fn departure_closes_session_and_notifies_once() {
    let meeting = create_test_meeting();
    let peer = PeerId::new();

    establish_inbound(&meeting, &peer).await;

    meeting
        .handle
        .send(MeetingCommand::ParticipantLeft {
            peer_id: peer.clone(),
        })
        .await;
    settle().await;

    assert!(meeting.factory.sessions()[0].is_closed());
    assert_eq!(
        meeting.events.left(),
        vec![(peer.clone(), DisconnectReason::Left)]
    );

    // Repeat departure is a no-op.
    meeting
        .handle
        .send(MeetingCommand::ParticipantLeft {
            peer_id: peer.clone(),
        })
        .await;
    settle().await;
    assert_eq!(meeting.events.left().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn message_after_teardown_builds_a_fresh_context() {
    let meeting = create_test_meeting();
    let peer = PeerId::new();

    establish_inbound(&meeting, &peer).await;
    meeting
        .handle
        .send(MeetingCommand::ParticipantLeft {
            peer_id: peer.clone(),
        })
        .await;
    settle().await;

    // The peer reappears; nothing stale is reused.
    establish_inbound(&meeting, &peer).await;

    let sessions = meeting.factory.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].is_closed());
    assert_eq!(sessions[1].phase(), SignalingPhase::Stable);
    assert_eq!(meeting.signaling.answer_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn fatal_apply_failure_tears_the_peer_down() {
    let meeting = create_test_meeting();
    let peer = PeerId::new();

    meeting
        .factory
        .push_script(SessionScript::offers([Behavior::FailFatal]));

    establish_inbound(&meeting, &peer).await;

    assert!(meeting.factory.sessions()[0].is_closed());
    assert_eq!(
        meeting.events.left(),
        vec![(peer.clone(), DisconnectReason::NegotiationFailed)]
    );
    assert_eq!(meeting.signaling.answer_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_session_creation_surfaces_negotiation_failure() {
    let meeting = create_test_meeting();
    let peer = PeerId::new();

    meeting.factory.fail_next_create();
    meeting
        .handle
        .send(MeetingCommand::ExistingParticipants {
            participants: vec![roster_entry(&peer, "dave")],
        })
        .await;
    settle().await;

    assert_eq!(meeting.factory.session_count(), 0);
    assert_eq!(
        meeting.events.left(),
        vec![(peer, DisconnectReason::NegotiationFailed)]
    );
}

#[tokio::test(start_paused = true)]
async fn one_peers_failure_leaves_others_untouched() {
    let meeting = create_test_meeting();
    let healthy = PeerId::new();
    let doomed = PeerId::new();

    establish_inbound(&meeting, &healthy).await;

    meeting
        .factory
        .push_script(SessionScript::offers([Behavior::FailFatal]));
    establish_inbound(&meeting, &doomed).await;

    let left = meeting.events.left();
    assert_eq!(left, vec![(doomed, DisconnectReason::NegotiationFailed)]);
    assert_eq!(
        meeting.factory.sessions()[0].phase(),
        SignalingPhase::Stable
    );
    assert!(!meeting.factory.sessions()[0].is_closed());
}
