use super::*;

use std::{cell::RefCell, rc::Rc};

use shared::error::PayloadError;
use shared::protocol::PayloadKind;

type Journal = Rc<RefCell<Vec<(String, String, Option<Payload>)>>>;

struct Recorder {
    name: &'static str,
    journal: Journal,
}

impl Recorder {
    fn new(name: &'static str, journal: &Journal) -> Rc<Self> {
        Rc::new(Self {
            name,
            journal: journal.clone(),
        })
    }
}

impl MessageHandler for Recorder {
    fn message_handler(&self, topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        self.journal
            .borrow_mut()
            .push((self.name.to_string(), topic.to_string(), payload.cloned()));
        Ok(())
    }
}

struct Failing;

impl MessageHandler for Failing {
    fn message_handler(&self, _topic: &str, _payload: Option<&Payload>) -> Result<(), HandlerError> {
        Err(HandlerError::rejected("boom"))
    }
}

fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

fn names(journal: &Journal) -> Vec<String> {
    journal.borrow().iter().map(|(name, _, _)| name.clone()).collect()
}

#[test]
fn delivers_in_subscription_order() {
    let messenger = Messenger::new();
    let log = journal();
    let first = Recorder::new("first", &log);
    let second = Recorder::new("second", &log);
    let third = Recorder::new("third", &log);

    messenger.subscribe("view:buttonClick", &second);
    messenger.subscribe("view:buttonClick", &first);
    messenger.subscribe("view:buttonClick", &third);

    let report = messenger
        .publish("view:buttonClick", Some(Payload::from("clicked")))
        .expect("publish");

    assert_eq!(report.delivered, 3);
    assert_eq!(names(&log), vec!["second", "first", "third"]);
}

#[test]
fn publish_without_subscribers_is_noop() {
    let messenger = Messenger::new();
    let report = messenger.publish("unknown:topic", None).expect("publish");
    assert_eq!(report.delivered, 0);
    assert!(report.is_clean());
    assert!(messenger.topics().is_empty());
}

#[test]
fn payload_arrives_unchanged() {
    let messenger = Messenger::new();
    let log = journal();
    let handler = Recorder::new("a", &log);
    messenger.subscribe("view:buttonClick", &handler);

    let payload = Payload::Json(serde_json::json!({"x": [1, 2, 3], "y": null}));
    messenger
        .publish("view:buttonClick", Some(payload.clone()))
        .expect("publish");

    let entries = log.borrow();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1, "view:buttonClick");
    assert_eq!(entries[0].2.as_ref(), Some(&payload));
}

#[test]
fn absent_payload_is_delivered_as_none() {
    let messenger = Messenger::new();
    let log = journal();
    let handler = Recorder::new("a", &log);
    messenger.subscribe("view:buttonClick", &handler);

    messenger.publish("view:buttonClick", None).expect("publish");
    assert_eq!(log.borrow()[0].2, None);
}

#[test]
fn publishing_twice_delivers_twice() {
    let messenger = Messenger::new();
    let log = journal();
    let handler = Recorder::new("a", &log);
    messenger.subscribe("t", &handler);

    messenger.publish("t", Some(Payload::Int(1))).expect("first");
    messenger.publish("t", Some(Payload::Int(1))).expect("second");
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn duplicate_subscription_is_not_deduplicated() {
    let messenger = Messenger::new();
    let log = journal();
    let handler = Recorder::new("a", &log);
    let first = messenger.subscribe("t", &handler);
    let second = messenger.subscribe("t", &handler);

    assert_ne!(first, second);
    assert_eq!(messenger.subscriber_count("t"), 2);
    let report = messenger.publish("t", None).expect("publish");
    assert_eq!(report.delivered, 2);
}

#[test]
fn topics_are_isolated() {
    let messenger = Messenger::new();
    let log = journal();
    let a = Recorder::new("a", &log);
    let b = Recorder::new("b", &log);
    messenger.subscribe("model:variable1Changed", &a);
    messenger.subscribe("model:variable2Changed", &b);

    messenger
        .publish("model:variable2Changed", Some(Payload::Int(5)))
        .expect("publish");
    assert_eq!(names(&log), vec!["b"]);
}

#[test]
fn unsubscribe_removes_every_registration_of_handler() {
    let messenger = Messenger::new();
    let log = journal();
    let a = Recorder::new("a", &log);
    let b = Recorder::new("b", &log);
    messenger.subscribe("t", &a);
    messenger.subscribe("t", &b);
    messenger.subscribe("t", &a);

    assert_eq!(messenger.unsubscribe("t", &a), 2);
    messenger.publish("t", None).expect("publish");
    assert_eq!(names(&log), vec!["b"]);

    assert_eq!(messenger.unsubscribe("t", &b), 1);
    assert_eq!(messenger.subscriber_count("t"), 0);
    assert!(messenger.topics().is_empty());
}

#[test]
fn unsubscribe_unknown_is_noop() {
    let messenger = Messenger::new();
    let log = journal();
    let a = Recorder::new("a", &log);
    assert_eq!(messenger.unsubscribe("never", &a), 0);
    assert!(!messenger.unsubscribe_id("never", SubscriptionId(99)));
}

#[test]
fn unsubscribe_id_removes_single_registration() {
    let messenger = Messenger::new();
    let log = journal();
    let a = Recorder::new("a", &log);
    let first = messenger.subscribe("t", &a);
    messenger.subscribe("t", &a);

    assert!(messenger.unsubscribe_id("t", first));
    assert!(!messenger.unsubscribe_id("t", first));
    let report = messenger.publish("t", None).expect("publish");
    assert_eq!(report.delivered, 1);
}

#[test]
fn dropped_handler_is_skipped_until_pruned() {
    let messenger = Messenger::new();
    let log = journal();
    let kept = Recorder::new("kept", &log);
    {
        let gone = Recorder::new("gone", &log);
        messenger.subscribe("t", &gone);
    }
    messenger.subscribe("t", &kept);

    let report = messenger.publish("t", None).expect("publish");
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped_dropped, 1);
    assert_eq!(messenger.subscriber_count("t"), 2);

    assert_eq!(messenger.prune_dropped(), 1);
    assert_eq!(messenger.subscriber_count("t"), 1);
}

#[test]
fn isolate_policy_continues_after_failure() {
    let messenger = Messenger::new();
    let log = journal();
    let failing = Rc::new(Failing);
    let after = Recorder::new("after", &log);
    let failing_id = messenger.subscribe("t", &failing);
    messenger.subscribe("t", &after);

    let report = messenger.publish("t", None).expect("isolate never errors");
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].subscription, failing_id);
    assert!(!report.is_clean());
    assert_eq!(names(&log), vec!["after"]);
}

#[test]
fn abort_policy_stops_at_first_failure() {
    let messenger = Messenger::with_options(DispatchOptions {
        policy: DispatchPolicy::Abort,
        ..DispatchOptions::default()
    });
    let log = journal();
    let before = Recorder::new("before", &log);
    let failing = Rc::new(Failing);
    let after = Recorder::new("after", &log);
    messenger.subscribe("t", &before);
    let failing_id = messenger.subscribe("t", &failing);
    messenger.subscribe("t", &after);

    let err = messenger.publish("t", None).expect_err("abort");
    match err {
        DispatchError::Handler {
            topic,
            subscription,
            source: HandlerError::Rejected(message),
        } => {
            assert_eq!(topic, "t");
            assert_eq!(subscription, failing_id);
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(names(&log), vec!["before"]);
}

struct Relay {
    messenger: Rc<Messenger>,
    to: &'static str,
}

impl MessageHandler for Relay {
    fn message_handler(&self, _topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        self.messenger.publish(self.to, payload.cloned())?;
        Ok(())
    }
}

#[test]
fn nested_publish_runs_synchronously() {
    let messenger = Rc::new(Messenger::new());
    let log = journal();
    let relay = Rc::new(Relay {
        messenger: messenger.clone(),
        to: "controller:changeButton",
    });
    let sink = Recorder::new("sink", &log);
    let tail = Recorder::new("tail", &log);
    messenger.subscribe("view:changeButton", &relay);
    messenger.subscribe("view:changeButton", &tail);
    messenger.subscribe("controller:changeButton", &sink);

    messenger
        .publish("view:changeButton", Some(Payload::Int(1)))
        .expect("publish");

    // The relayed message is handled before the next handler of the outer topic.
    assert_eq!(names(&log), vec!["sink", "tail"]);
}

#[test]
fn runaway_recursion_hits_depth_guard() {
    let messenger = Rc::new(Messenger::with_options(DispatchOptions {
        policy: DispatchPolicy::Abort,
        max_depth: 4,
    }));
    let echo = Rc::new(Relay {
        messenger: messenger.clone(),
        to: "loop",
    });
    messenger.subscribe("loop", &echo);

    let err = messenger.publish("loop", None).expect_err("depth");
    let mut current: &dyn std::error::Error = &err;
    let mut saw_depth = false;
    loop {
        if current.to_string().contains("max dispatch depth 4") {
            saw_depth = true;
        }
        match current.source() {
            Some(next) => current = next,
            None => break,
        }
    }
    assert!(saw_depth, "error chain: {err}");

    // The guard unwinds: a fresh publish starts at depth zero again.
    messenger.unsubscribe("loop", &echo);
    messenger.publish("loop", None).expect("after unwind");
}

struct SubscribeDuringDispatch {
    messenger: Rc<Messenger>,
    late: Rc<Recorder>,
}

impl MessageHandler for SubscribeDuringDispatch {
    fn message_handler(&self, topic: &str, _payload: Option<&Payload>) -> Result<(), HandlerError> {
        self.messenger.subscribe(topic, &self.late);
        Ok(())
    }
}

#[test]
fn subscription_made_during_dispatch_applies_to_next_publish() {
    let messenger = Rc::new(Messenger::new());
    let log = journal();
    let late = Recorder::new("late", &log);
    let subscriber = Rc::new(SubscribeDuringDispatch {
        messenger: messenger.clone(),
        late,
    });
    messenger.subscribe("t", &subscriber);

    messenger.publish("t", None).expect("first");
    assert!(log.borrow().is_empty());

    messenger.publish("t", None).expect("second");
    assert_eq!(names(&log), vec!["late"]);
}

struct ExpectsInt;

impl MessageHandler for ExpectsInt {
    fn message_handler(&self, _topic: &str, payload: Option<&Payload>) -> Result<(), HandlerError> {
        Payload::expect_kind(payload, PayloadKind::Int)?;
        Ok(())
    }
}

#[test]
fn payload_errors_surface_as_handler_failures() {
    let messenger = Messenger::new();
    let handler = Rc::new(ExpectsInt);
    messenger.subscribe("t", &handler);

    let report = messenger
        .publish("t", Some(Payload::from("nope")))
        .expect("publish");
    assert!(matches!(
        report.failures[0].error,
        HandlerError::Payload(PayloadError::Mismatch { .. })
    ));
}

#[test]
fn dispatch_policy_parses_from_config_strings() {
    assert_eq!("Abort".parse::<DispatchPolicy>(), Ok(DispatchPolicy::Abort));
    assert_eq!(" isolate ".parse::<DispatchPolicy>(), Ok(DispatchPolicy::Isolate));
    assert!("retry".parse::<DispatchPolicy>().is_err());
}
