//! Slot invariants under arbitrary cross-session interleavings.
//!
//! Each session delivers its own notifications in order; the order between
//! the two sessions, hang-ups and track arrivals is chosen by proptest.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::{MockSession, RecordingRenderer};
use rvoip_session_arbiter::{
    CallMediaConstraints, CollectingStatusSink, MediaBinder, MediaSource, Originator, PeerConnectionId,
    SessionArbiter, SessionEvent, SessionId, SessionRole, StatusKind,
};

#[derive(Debug, Clone, Copy)]
enum Step {
    Incoming,
    Outgoing,
    HangUp,
    Track(u8),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => Just(Step::Incoming),
        4 => Just(Step::Outgoing),
        1 => Just(Step::HangUp),
        1 => (1u8..=2).prop_map(Step::Track),
    ]
}

fn terminal(fails: bool) -> SessionEvent {
    if fails {
        SessionEvent::Failed { originator: Originator::Remote, cause: "Busy Here".into() }
    } else {
        SessionEvent::Ended { originator: Originator::Remote, cause: "BYE".into() }
    }
}

fn incoming_script(accepts: bool, fails: bool) -> Vec<SessionEvent> {
    let mut script = vec![
        SessionEvent::PeerConnectionReady { peer: PeerConnectionId::from("p1") },
        SessionEvent::Progress { originator: Originator::Local, response: None },
    ];
    if accepts {
        script.push(SessionEvent::Accepted { originator: Originator::Remote });
    }
    script.push(SessionEvent::Confirmed { originator: Originator::Remote });
    script.push(terminal(fails));
    script
}

fn outgoing_script(fails: bool) -> Vec<SessionEvent> {
    vec![
        SessionEvent::Progress { originator: Originator::Remote, response: Some("180 Ringing".into()) },
        SessionEvent::PeerConnectionReady { peer: PeerConnectionId::from("p2") },
        SessionEvent::Connecting,
        SessionEvent::Accepted { originator: Originator::Remote },
        SessionEvent::Confirmed { originator: Originator::Remote },
        terminal(fails),
    ]
}

struct Race {
    arbiter: SessionArbiter,
    status: Arc<CollectingStatusSink>,
    s1: Arc<MockSession>,
    s2: Arc<MockSession>,
    scripts: [(SessionId, Vec<SessionEvent>, usize); 2],
    tracks: usize,
}

impl Race {
    fn new(accepts: bool, s1_fails: bool, s2_fails: bool) -> Self {
        let status = Arc::new(CollectingStatusSink::new());
        let mut arbiter = SessionArbiter::new(
            CallMediaConstraints::default(),
            MediaBinder::new(Arc::new(RecordingRenderer::default())),
            status.clone(),
        );
        let s1 = MockSession::new("s1");
        let s2 = MockSession::new("s2");
        arbiter.on_new_session(SessionRole::Incoming, s1.clone());
        arbiter.on_new_session(SessionRole::Outgoing, s2.clone());

        Self {
            arbiter,
            status,
            s1,
            s2,
            scripts: [
                (SessionId::from("s1"), incoming_script(accepts, s1_fails), 0),
                (SessionId::from("s2"), outgoing_script(s2_fails), 0),
            ],
            tracks: 0,
        }
    }

    fn advance(&mut self, index: usize) {
        let (id, script, cursor) = &mut self.scripts[index];
        if let Some(event) = script.get(*cursor).cloned() {
            *cursor += 1;
            self.arbiter.on_session_event(id, event);
        }
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Incoming => self.advance(0),
            Step::Outgoing => self.advance(1),
            Step::HangUp => {
                self.arbiter.hang_up();
            }
            Step::Track(n) => {
                self.tracks += 1;
                let peer = PeerConnectionId::from(format!("p{}", n).as_str());
                self.arbiter
                    .on_track_arrived(&peer, MediaSource::new(format!("track-{}", self.tracks)));
            }
        }
    }

    fn finish(&mut self) {
        for index in 0..2 {
            while self.scripts[index].2 < self.scripts[index].1.len() {
                self.advance(index);
            }
        }
    }

    fn terminal_statuses_for(&self, id: &str) -> usize {
        self.status
            .events()
            .iter()
            .filter(|e| e.is_terminal() && e.session_id.as_ref().map(|s| s.as_str()) == Some(id))
            .count()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn slots_stay_consistent(
        steps in prop::collection::vec(step(), 0..40),
        accepts in any::<bool>(),
        s1_fails in any::<bool>(),
        s2_fails in any::<bool>(),
    ) {
        let mut race = Race::new(accepts, s1_fails, s2_fails);

        for step in steps {
            race.apply(step);
            prop_assert!(race.arbiter.invariants_hold(), "after {:?}: {:?}", step, race.arbiter.slots());
            prop_assert!(race.terminal_statuses_for("s1") <= 1);
            prop_assert!(race.terminal_statuses_for("s2") <= 1);
            prop_assert!(race.s1.terminate_count() <= 1);
            prop_assert!(race.s2.terminate_count() <= 1);
        }

        race.finish();
        prop_assert!(race.arbiter.slots().is_empty());
        prop_assert!(race.arbiter.media().remote_source().is_none());
        prop_assert_eq!(race.terminal_statuses_for("s1"), 1);
        prop_assert_eq!(race.terminal_statuses_for("s2"), 1);
        prop_assert_eq!(race.s1.answer_count(), 1);
        prop_assert_eq!(race.s2.answer_count(), 0);
    }

    #[test]
    fn first_promotion_wins(steps in prop::collection::vec(step(), 0..40)) {
        let mut race = Race::new(true, true, true);
        let mut first_current: Option<SessionId> = None;

        for step in steps {
            let hung_up = matches!(step, Step::HangUp);
            race.apply(step);
            if hung_up {
                first_current = None;
            }
            let current = race.arbiter.slots().current().cloned();
            match (current, first_current.clone()) {
                (Some(current), None) => first_current = Some(current),
                (Some(current), Some(first)) => prop_assert_eq!(current, first),
                (None, _) => first_current = None,
            }
        }
    }
}

#[test]
fn incoming_confirmed_before_outgoing_connecting() {
    let mut race = Race::new(false, false, false);
    // p1 ready, progress, confirmed
    race.advance(0);
    race.advance(0);
    race.advance(0);
    // progress, p2 ready, connecting
    race.advance(1);
    race.advance(1);
    race.advance(1);

    assert_eq!(race.arbiter.slots().current(), Some(&SessionId::from("s1")));
    assert_eq!(
        race.arbiter.slots().candidate(SessionRole::Outgoing),
        Some(&SessionId::from("s2"))
    );
    assert!(race
        .status
        .kinds()
        .iter()
        .all(|k| !matches!(k, StatusKind::CallFailed { .. } | StatusKind::CallEnded { .. })));
}
