// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn event_kind_parses_known_names() {
    assert_eq!(EventKind::parse("option_cancelled"), EventKind::OptionCancelled);
    assert_eq!(EventKind::parse("free_to_book_again"), EventKind::FreeToBookAgain);
    assert_eq!(EventKind::parse("waitlist_booked"), EventKind::WaitlistBooked);
}

#[test]
fn event_kind_maps_unknown_names_to_custom() {
    let kind = EventKind::parse("booking_confirmed");
    assert_eq!(kind, EventKind::Custom("booking_confirmed".to_string()));
    assert_eq!(kind.name(), "booking_confirmed");
}

#[test]
fn event_kind_round_trips_through_name() {
    for kind in [
        EventKind::OptionCancelled,
        EventKind::AnswerCancelled,
        EventKind::OptionUpdated,
        EventKind::TeacherAdded,
        EventKind::WaitlistBooked,
        EventKind::FreeToBookAgain,
    ] {
        assert_eq!(EventKind::parse(&kind.name()), kind);
    }
}

#[test]
fn event_builder_sets_references_and_payload() {
    let event = DomainEvent::new(EventKind::AnswerCancelled, "opt-1", t0())
        .with_answer("ans-4")
        .with_related_user("u1")
        .with_acting_user("manager")
        .with_payload("title", "Yoga for beginners");

    assert_eq!(event.option_id, OptionId::from("opt-1"));
    assert_eq!(event.answer_id.as_deref(), Some("ans-4"));
    assert_eq!(event.related_user, Some(UserId::from("u1")));
    assert_eq!(event.acting_user, Some(UserId::from("manager")));
    assert_eq!(event.payload.get("title").map(String::as_str), Some("Yoga for beginners"));
}

#[test]
fn event_serializes_with_snake_case_kind() {
    let event = DomainEvent::new(EventKind::WaitlistBooked, "opt-1", t0());
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"waitlist_booked\""));

    let back: DomainEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}
