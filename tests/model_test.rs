//! Pure model tests: enum round-trips, transition table, policy math.

use shopfloor_rs::error::Error;
use shopfloor_rs::event::{ASSIGNMENT_CHANNEL, ChangeEvent, TICKET_CHANNEL};
use shopfloor_rs::model::*;
use shopfloor_rs::policy::CommissionPolicy;

#[test]
fn role_strings_round_trip() {
    for role in Role::ALL {
        let parsed: Role = role.to_string().parse().unwrap();
        assert_eq!(parsed, role);
    }
}

#[test]
fn unknown_role_is_validation_error() {
    let err = "welder".parse::<Role>().unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "got {err:?}");
}

#[test]
fn commission_eligibility_is_mechanic_and_body_work() {
    let eligible: Vec<Role> = Role::ALL
        .into_iter()
        .filter(|r| r.commission_eligible())
        .collect();
    assert_eq!(eligible, vec![Role::Mechanic, Role::BodyWork]);
}

#[test]
fn quality_roles() {
    assert!(Role::Quality.is_quality());
    assert!(Role::QualitySystem.is_quality());
    assert!(!Role::Mechanic.is_quality());
}

#[test]
fn ticket_status_transition_table() {
    use TicketStatus::*;

    assert!(Pending.can_transition_to(InProgress));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(InProgress.can_transition_to(Completed));
    assert!(InProgress.can_transition_to(Cancelled));
    // Quality rejection reopens a completed ticket.
    assert!(Completed.can_transition_to(InProgress));

    assert!(!Pending.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(InProgress));
    assert!(!Cancelled.can_transition_to(Pending));
}

#[test]
fn only_cancelled_is_terminal() {
    assert!(TicketStatus::Cancelled.is_terminal());
    assert!(!TicketStatus::Completed.is_terminal());
    assert!(!TicketStatus::Pending.is_terminal());
    assert!(!TicketStatus::InProgress.is_terminal());
}

#[test]
fn status_strings_round_trip() {
    for status in [
        TicketStatus::Pending,
        TicketStatus::InProgress,
        TicketStatus::Completed,
        TicketStatus::Cancelled,
    ] {
        let parsed: TicketStatus = status.to_string().parse().unwrap();
        assert_eq!(parsed, status);
    }
}

#[test]
fn default_policy_rates() {
    let policy = CommissionPolicy::default_rates();
    assert_eq!(policy.rate_bps(Role::Mechanic), 1000);
    assert_eq!(policy.rate_bps(Role::BodyWork), 1000);
    // Non-eligible roles accrue nothing.
    assert_eq!(policy.rate_bps(Role::Wash), 0);
    assert_eq!(policy.rate_bps(Role::Quality), 0);
}

#[test]
fn commission_amount_is_basis_points_of_labor() {
    let policy = CommissionPolicy::default_rates();
    // 10% of 20_000 minor units
    assert_eq!(policy.amount_for(Role::Mechanic, 20_000), 2_000);
    assert_eq!(policy.amount_for(Role::Wash, 20_000), 0);
    assert_eq!(policy.amount_for(Role::Mechanic, 0), 0);
}

#[test]
fn policy_loads_overrides_from_toml() {
    let dir = std::env::temp_dir().join(format!("shopfloor-policy-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.toml");
    std::fs::write(
        &path,
        "[commission.rates]\nmechanic = 500\n\"body-work\" = 750\n",
    )
    .unwrap();

    let policy = CommissionPolicy::load_from_file(&path).unwrap();
    assert_eq!(policy.rate_bps(Role::Mechanic), 500);
    assert_eq!(policy.rate_bps(Role::BodyWork), 750);
    assert_eq!(policy.amount_for(Role::Mechanic, 10_000), 500);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn policy_rejects_unknown_role_names() {
    let dir = std::env::temp_dir().join(format!("shopfloor-policy-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.toml");
    std::fs::write(&path, "[commission.rates]\nwelder = 500\n").unwrap();

    let err = CommissionPolicy::load_from_file(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {err:?}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn events_route_to_their_channels() {
    let ticket_event = ChangeEvent::TicketCreated {
        id: TicketId::new(),
        track_no: 7,
    };
    assert_eq!(ticket_event.channel(), TICKET_CHANNEL);

    let ledger_event = ChangeEvent::AssignmentClaimed {
        id: AssignmentId::new(),
        service_id: TicketId::new(),
        worker_id: WorkerId::new(),
        role: Role::Painter,
    };
    assert_eq!(ledger_event.channel(), ASSIGNMENT_CHANNEL);
}

#[test]
fn events_serialize_tagged() {
    let event = ChangeEvent::TicketStatusChanged {
        id: TicketId::new(),
        from: TicketStatus::Pending,
        to: TicketStatus::InProgress,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "ticket_status_changed");
    assert_eq!(json["from"], "pending");
    assert_eq!(json["to"], "in_progress");
}
