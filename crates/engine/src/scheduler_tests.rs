// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bn_core::adapters::{MemoryStore, RecordingMailer};
use bn_core::event::DomainEvent;
use bn_core::pending::ActionState;
use bn_core::rule::{MailAction, Recipients, Trigger};
use chrono::TimeZone;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap()
}

fn reminder_rule(id: &str) -> Rule {
    Rule::new(
        id,
        "start reminder",
        Trigger::TimeRelative {
            date_field: "coursestarttime".to_string(),
            offset_secs: 3600,
        },
        Recipients::StudentsInOption,
        MailAction::new("Reminder: {title}", "See you soon, {userid}"),
    )
}

fn option_with_booking() -> BookingOption {
    BookingOption::new("opt1", "Yoga")
        .with_capacity(5)
        .with_booked("alice")
}

fn action_for(rule: &Rule, id: &str, slot: &str, due: DateTime<Utc>) -> PendingAction {
    PendingAction::new(
        id,
        ActionKey::new(rule.id.clone(), "alice", "opt1", slot),
        due,
        rule.fingerprint(),
        rule.action.subject.clone(),
        rule.action.body.clone(),
        at(0),
    )
}

fn setup(rule: &Rule) -> (RuleStore, MemoryStore, RecordingMailer, EngineConfig) {
    let mut rules = RuleStore::new();
    rules.insert(rule.clone());
    let store = MemoryStore::new();
    store.put_option(option_with_booking());
    (rules, store, RecordingMailer::new(), EngineConfig::default())
}

async fn run_due(
    sched: &mut ActionScheduler,
    id: &ActionId,
    rules: &RuleStore,
    store: &MemoryStore,
    mailer: &RecordingMailer,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Option<ExecutionOutcome> {
    let mut pass = RenderPass::new();
    sched
        .execute(id, rules, store, mailer, config, now, &mut pass)
        .await
}

#[test]
fn schedule_same_key_and_config_is_a_no_op() {
    let rule = reminder_rule("r1");
    let mut sched = ActionScheduler::new();

    let first = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    let second = sched.schedule(action_for(&rule, "a2", "coursestarttime", at(9)));

    assert_eq!(first, second);
    assert_eq!(sched.live_count(), 1);
}

#[test]
fn schedule_with_changed_due_supersedes() {
    let rule = reminder_rule("r1");
    let mut sched = ActionScheduler::new();

    let first = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    let second = sched.schedule(action_for(&rule, "a2", "coursestarttime", at(11)));

    assert_ne!(first, second);
    assert_eq!(sched.live_count(), 1);
    assert!(sched.get(&first).is_none());
    let live = sched
        .get_key(&ActionKey::new("r1", "alice", "opt1", "coursestarttime"))
        .unwrap();
    assert_eq!(live.due, at(11));
}

#[test]
fn schedule_with_changed_fingerprint_supersedes() {
    let rule = reminder_rule("r1");
    let mut sched = ActionScheduler::new();
    sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    let mut changed = reminder_rule("r1");
    changed.action.subject = "New subject".to_string();
    let id = sched.schedule(action_for(&changed, "a2", "coursestarttime", at(9)));

    assert_eq!(sched.live_count(), 1);
    assert_eq!(sched.get(&id).unwrap().fingerprint, changed.fingerprint());
}

#[test]
fn cancel_helpers_remove_matching_live_actions() {
    let r1 = reminder_rule("r1");
    let r2 = reminder_rule("r2");
    let mut sched = ActionScheduler::new();
    sched.schedule(action_for(&r1, "a1", "coursestarttime", at(9)));
    sched.schedule(action_for(&r2, "a2", "coursestarttime", at(9)));
    sched.schedule(PendingAction::new(
        "a3",
        ActionKey::new("r1", "bob", "opt2", "coursestarttime"),
        at(9),
        r1.fingerprint(),
        "s",
        "b",
        at(0),
    ));

    assert_eq!(sched.cancel_option(&"opt1".into()), 2);
    assert_eq!(sched.live_count(), 1);
    assert_eq!(sched.cancel_rule(&"r1".into()), 1);
    assert_eq!(sched.live_count(), 0);
    assert!(!sched.cancel_key(&ActionKey::new("r1", "bob", "opt2", "coursestarttime")));
}

#[test]
fn due_actions_earliest_first() {
    let rule = reminder_rule("r1");
    let mut sched = ActionScheduler::new();
    let late = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(11)));
    let early = sched.schedule(action_for(&rule, "a2", "session:s1", at(9)));

    assert_eq!(sched.due_actions(at(8)), Vec::<ActionId>::new());
    assert_eq!(sched.due_actions(at(10)), vec![early.clone()]);
    assert_eq!(sched.due_actions(at(12)), vec![early, late]);
}

#[tokio::test]
async fn execute_renders_and_sends() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::Sent));
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user, "alice".into());
    assert_eq!(sent[0].subject, "Reminder: Yoga");
    assert_eq!(sent[0].body, "See you soon, alice");
    assert_eq!(sched.get(&id).unwrap().state, ActionState::Executed);
    assert_eq!(sched.live_count(), 0);
}

#[tokio::test]
async fn execute_twice_sends_once() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    let second = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(second, None);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn changed_rule_suppresses_as_stale() {
    let rule = reminder_rule("r1");
    let (mut rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    let mut changed = reminder_rule("r1");
    changed.action.body = "Changed body".to_string();
    rules.insert(changed);

    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::SuppressedStale));
    assert!(mailer.sent().is_empty());
    assert_eq!(sched.get(&id).unwrap().state, ActionState::SuppressedStale);
}

#[tokio::test]
async fn missing_rule_drops_the_action() {
    let rule = reminder_rule("r1");
    let (mut rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    rules.remove(&"r1".into());

    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::Dropped));
    assert!(mailer.sent().is_empty());
    assert!(sched.get(&id).is_none());
}

#[tokio::test]
async fn cancelled_option_suppresses_reminder() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut cancelled = option_with_booking();
    cancelled.cancelled = true;
    store.put_option(cancelled);

    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::SuppressedInapplicable));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn cancellation_mail_still_goes_out_for_cancelled_option() {
    let rule = Rule::new(
        "r1",
        "cancellation notice",
        Trigger::OnEvent {
            event: EventKind::OptionCancelled,
        },
        Recipients::StudentsInOption,
        MailAction::new("Cancelled: {title}", "Sorry, {userid}"),
    );
    let (rules, store, mailer, config) = setup(&rule);
    let mut cancelled = option_with_booking();
    cancelled.cancelled = true;
    store.put_option(cancelled);

    let event = DomainEvent::new(EventKind::OptionCancelled, "opt1", at(8));
    let mut sched = ActionScheduler::new();
    let action = PendingAction::new(
        "a1",
        ActionKey::new("r1", "alice", "opt1", event.kind.name()),
        at(8),
        rule.fingerprint(),
        rule.action.subject.clone(),
        rule.action.body.clone(),
        at(8),
    )
    .with_event(event);
    let id = sched.schedule(action);

    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(8)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::Sent));
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn invisible_option_suppresses_unless_configured() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut hidden = option_with_booking();
    hidden.visible = false;
    store.put_option(hidden);

    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(outcome, Some(ExecutionOutcome::SuppressedInapplicable));

    let permissive = EngineConfig {
        send_for_invisible: true,
        ..EngineConfig::default()
    };
    let id2 = sched.schedule(action_for(&rule, "a2", "coursestarttime", at(9)));
    let outcome = run_due(&mut sched, &id2, &rules, &store, &mailer, &permissive, at(9)).await;
    assert_eq!(outcome, Some(ExecutionOutcome::Sent));
}

#[tokio::test]
async fn departed_recipient_is_suppressed() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    // alice cancels her booking before the reminder fires
    store.put_option(BookingOption::new("opt1", "Yoga").with_capacity(5));

    let outcome = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;

    assert_eq!(outcome, Some(ExecutionOutcome::SuppressedInapplicable));
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn fired_overriding_rule_suppresses_the_overridden_action() {
    let reminder = reminder_rule("r1");
    let notice = Rule::new(
        "r2",
        "cancellation notice",
        Trigger::OnEvent {
            event: EventKind::AnswerCancelled,
        },
        Recipients::StudentsInOption,
        MailAction::new("n", "n"),
    )
    .with_override("r1");

    let (mut rules, store, mailer, config) = setup(&reminder);
    rules.insert(notice.clone());

    let mut sched = ActionScheduler::new();
    let reminder_id = sched.schedule(action_for(&reminder, "a1", "coursestarttime", at(9)));
    let notice_action = PendingAction::new(
        "a2",
        ActionKey::new("r2", "alice", "opt1", "answer_cancelled"),
        at(8),
        notice.fingerprint(),
        "n",
        "n",
        at(8),
    )
    .with_event(DomainEvent::new(EventKind::AnswerCancelled, "opt1", at(8)));
    let notice_id = sched.schedule(notice_action);

    let first = run_due(&mut sched, &notice_id, &rules, &store, &mailer, &config, at(8)).await;
    assert_eq!(first, Some(ExecutionOutcome::Sent));

    let second = run_due(&mut sched, &reminder_id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(second, Some(ExecutionOutcome::SuppressedInapplicable));
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn override_does_not_reach_actions_scheduled_after_the_send() {
    let reminder = reminder_rule("r1");
    let notice = Rule::new(
        "r2",
        "cancellation notice",
        Trigger::OnEvent {
            event: EventKind::AnswerCancelled,
        },
        Recipients::StudentsInOption,
        MailAction::new("n", "n"),
    )
    .with_override("r1");

    let (mut rules, store, mailer, config) = setup(&reminder);
    rules.insert(notice.clone());

    let mut sched = ActionScheduler::new();
    let notice_action = PendingAction::new(
        "a1",
        ActionKey::new("r2", "alice", "opt1", "answer_cancelled"),
        at(8),
        notice.fingerprint(),
        "n",
        "n",
        at(8),
    )
    .with_event(DomainEvent::new(EventKind::AnswerCancelled, "opt1", at(8)));
    let notice_id = sched.schedule(notice_action);
    let first = run_due(&mut sched, &notice_id, &rules, &store, &mailer, &config, at(8)).await;
    assert_eq!(first, Some(ExecutionOutcome::Sent));

    // A reminder scheduled after the notice went out is a fresh trigger
    // and must not inherit the suppression.
    let later = PendingAction::new(
        "a2",
        ActionKey::new("r1", "alice", "opt1", "coursestarttime"),
        at(10),
        reminder.fingerprint(),
        reminder.action.subject.clone(),
        reminder.action.body.clone(),
        at(10),
    );
    let later_id = sched.schedule(later);
    let second = run_due(&mut sched, &later_id, &rules, &store, &mailer, &config, at(10)).await;
    assert_eq!(second, Some(ExecutionOutcome::Sent));
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn interval_reschedules_instead_of_sending() {
    let mut rule = reminder_rule("r1");
    rule.action = rule
        .action
        .with_interval(std::time::Duration::from_secs(7200));
    let (rules, store, mailer, config) = setup(&rule);

    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    let first = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(first, Some(ExecutionOutcome::Sent));

    // The key is free again once the first action finished
    let id2 = sched.schedule(action_for(&rule, "a2", "coursestarttime", at(10)));
    let second = run_due(&mut sched, &id2, &rules, &store, &mailer, &config, at(10)).await;
    assert_eq!(second, Some(ExecutionOutcome::Rescheduled { until: at(11) }));
    assert_eq!(sched.get(&id2).unwrap().due, at(11));
    assert_eq!(mailer.sent().len(), 1);

    // Past the window the rescheduled action goes out
    let third = run_due(&mut sched, &id2, &rules, &store, &mailer, &config, at(11)).await;
    assert_eq!(third, Some(ExecutionOutcome::Sent));
    assert_eq!(mailer.sent().len(), 2);
}

#[tokio::test]
async fn transient_failures_retry_then_fail_permanently() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    mailer.fail_next("alice", 5);

    let mut sched = ActionScheduler::new();
    let id = sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));

    let first = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(first, Some(ExecutionOutcome::Retried { attempt: 1 }));
    assert!(sched.get(&id).unwrap().is_pending());

    let second = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(second, Some(ExecutionOutcome::Retried { attempt: 2 }));

    let third = run_due(&mut sched, &id, &rules, &store, &mailer, &config, at(9)).await;
    assert_eq!(third, Some(ExecutionOutcome::Failed));
    assert_eq!(sched.get(&id).unwrap().state, ActionState::Failed);
    assert_eq!(sched.live_count(), 0);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn sweep_renders_each_action_with_its_own_event_snapshot() {
    let update_rule = Rule::new(
        "r1",
        "update notice",
        Trigger::OnEvent {
            event: EventKind::OptionUpdated,
        },
        Recipients::StudentsInOption,
        MailAction::new("{note}", "b"),
    );
    let cancel_rule = Rule::new(
        "r2",
        "cancellation notice",
        Trigger::OnEvent {
            event: EventKind::AnswerCancelled,
        },
        Recipients::StudentsInOption,
        MailAction::new("{note}", "b"),
    );
    let (mut rules, store, mailer, config) = setup(&update_rule);
    rules.insert(cancel_rule.clone());

    // Same option, same recipient, same subject template, two different
    // payload snapshots in the same sweep.
    let mut sched = ActionScheduler::new();
    for (rule, id, kind, note) in [
        (&update_rule, "a1", EventKind::OptionUpdated, "first"),
        (&cancel_rule, "a2", EventKind::AnswerCancelled, "second"),
    ] {
        let event = DomainEvent::new(kind.clone(), "opt1", at(8)).with_payload("note", note);
        sched.schedule(
            PendingAction::new(
                id,
                ActionKey::new(rule.id.clone(), "alice", "opt1", kind.name()),
                at(8),
                rule.fingerprint(),
                rule.action.subject.clone(),
                rule.action.body.clone(),
                at(8),
            )
            .with_event(event),
        );
    }

    let report = sched.sweep(at(8), &rules, &store, &mailer, &config).await;

    assert_eq!(report.executed, 2);
    let sent = mailer.sent();
    let subjects: Vec<&str> = sent.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, vec!["first", "second"]);
}

#[tokio::test]
async fn sweep_tallies_outcomes() {
    let rule = reminder_rule("r1");
    let (rules, store, mailer, config) = setup(&rule);
    let mut sched = ActionScheduler::new();

    sched.schedule(action_for(&rule, "a1", "coursestarttime", at(9)));
    // A second action for a recipient who is gone by sweep time
    sched.schedule(PendingAction::new(
        "a2",
        ActionKey::new("r1", "bob", "opt1", "coursestarttime"),
        at(9),
        rule.fingerprint(),
        "s",
        "b",
        at(0),
    ));
    // Not yet due
    sched.schedule(action_for(&rule, "a3", "session:s1", at(12)));

    let report = sched.sweep(at(10), &rules, &store, &mailer, &config).await;

    assert_eq!(report.executed, 1);
    assert_eq!(report.suppressed_inapplicable, 1);
    assert_eq!(report.total(), 2);
    assert_eq!(mailer.sent().len(), 1);
    assert_eq!(sched.live_count(), 1);
    // Terminal records do not survive the sweep; the undue action does
    assert!(sched.get(&"a1".into()).is_none());
    assert!(sched.get(&"a2".into()).is_none());
    assert!(sched.get(&"a3".into()).is_some());
}
