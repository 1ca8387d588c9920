//! End-to-end scenarios through the public engine API.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ulid::Ulid;

use innkeep::engine::Engine;
use innkeep::notify::NotifyHub;
use innkeep::{
    BlockScope, DateBlock, EngineConfig, EngineError, GuestCounts, IndividualRoomRecord,
    OccupancyType, ReservationRequest, ReservationStatus, ReservationTarget, RoomStatus,
    RoomTypeRecord, StayRange,
};

fn tmp_wal(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("innkeep_test_scenarios");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}_{}.wal", Ulid::new()));
    let _ = fs::remove_file(&path);
    path
}

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, day).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
}

fn new_engine(path: &PathBuf) -> Engine {
    Engine::new(path.clone(), Arc::new(NotifyHub::new()), EngineConfig::default()).unwrap()
}

fn family_type() -> RoomTypeRecord {
    RoomTypeRecord {
        id: Ulid::new(),
        name: "Family Room".into(),
        total_inventory: 2,
        max_guests: 3,
        base_rate: 10_000,
        single_rate: Some(9_000),
        double_rate: Some(12_000),
        triple_rate: Some(14_000),
        single_enabled: true,
        double_enabled: true,
        triple_enabled: true,
        children_allowed: true,
        child_multiplier: Some(50),
    }
}

fn plain_room(rt: &RoomTypeRecord, number: &str) -> IndividualRoomRecord {
    IndividualRoomRecord {
        id: Ulid::new(),
        room_type_id: rt.id,
        number: number.into(),
        status: RoomStatus::Active,
        rate_override: None,
        single_override: None,
        double_override: None,
        triple_override: None,
        children_allowed_override: None,
        child_multiplier_override: None,
    }
}

#[tokio::test]
async fn full_booking_journey() {
    let path = tmp_wal("journey");
    let engine = new_engine(&path);

    let rt = family_type();
    engine.create_room_type(rt.clone()).await.unwrap();
    let r201 = plain_room(&rt, "201");
    engine.create_room(r201.clone()).await.unwrap();

    let stay = StayRange::new(d(2, 14), d(2, 17));
    let target = ReservationTarget::RoomType(rt.id);

    // Pre-check and quote before committing.
    let verdict = engine
        .check_availability(&target, &stay, GuestCounts::new(2, 1), None, now())
        .await
        .unwrap();
    assert!(verdict.available);
    assert_eq!(verdict.nights, 3);

    let quoted = engine
        .quote_stay(&target, &stay, GuestCounts::new(2, 1), OccupancyType::Double)
        .await
        .unwrap();
    // 12_000 × 3 nights + 12_000 × 50% × 1 child × 3 nights
    assert_eq!(quoted.room_total, 36_000);
    assert_eq!(quoted.child_supplement, 18_000);
    assert_eq!(quoted.total, 54_000);

    let booking = engine
        .create_reservation(
            ReservationRequest {
                target,
                guest_name: "Robin Falk".into(),
                range: stay,
                guests: GuestCounts::new(2, 1),
                occupancy: OccupancyType::Double,
                tentative: false,
            },
            now(),
        )
        .await
        .unwrap();
    assert_eq!(booking.price, quoted);
    assert_eq!(booking.status, ReservationStatus::Pending);

    // Front desk assigns a concrete room, confirms, checks in and out.
    let assigned = engine
        .assign_individual_room(booking.id, r201.id, now())
        .await
        .unwrap();
    assert_eq!(assigned.room_id, Some(r201.id));

    engine
        .update_reservation_status(booking.id, ReservationStatus::Confirmed)
        .await
        .unwrap();
    engine
        .update_reservation_status(booking.id, ReservationStatus::CheckedIn)
        .await
        .unwrap();
    let done = engine
        .update_reservation_status(booking.id, ReservationStatus::CheckedOut)
        .await
        .unwrap();
    assert_eq!(done.status, ReservationStatus::CheckedOut);

    // A checked-out stay no longer occupies the calendar.
    let verdict = engine
        .check_availability(
            &ReservationTarget::Room {
                room_type_id: rt.id,
                room_id: r201.id,
            },
            &stay,
            GuestCounts::new(2, 0),
            None,
            now(),
        )
        .await
        .unwrap();
    assert!(verdict.available);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn property_closure_blocks_every_type() {
    let path = tmp_wal("closure");
    let engine = new_engine(&path);

    let family = family_type();
    let mut single = family_type();
    single.id = Ulid::new();
    single.name = "Single".into();
    engine.create_room_type(family.clone()).await.unwrap();
    engine.create_room_type(single.clone()).await.unwrap();

    engine
        .add_date_block(DateBlock {
            id: Ulid::new(),
            scope: BlockScope::Global,
            range: StayRange::new(d(2, 20), d(2, 23)),
            reason: "winter closure".into(),
        })
        .await
        .unwrap();

    for type_id in [family.id, single.id] {
        let err = engine
            .create_reservation(
                ReservationRequest {
                    target: ReservationTarget::RoomType(type_id),
                    guest_name: "Kim Vos".into(),
                    range: StayRange::new(d(2, 21), d(2, 24)),
                    guests: GuestCounts::new(1, 0),
                    occupancy: OccupancyType::Single,
                    tentative: false,
                },
                now(),
            )
            .await
            .unwrap_err();
        match err {
            EngineError::Unavailable(verdict) => {
                assert_eq!(verdict.block_reasons.len(), 1);
                assert!(verdict.conflicts.is_empty());
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    assert_eq!(engine.list_global_blocks().await.len(), 1);

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn hold_race_on_last_unit() {
    let path = tmp_wal("hold_race");
    let engine = new_engine(&path);

    let mut rt = family_type();
    rt.total_inventory = 1;
    engine.create_room_type(rt.clone()).await.unwrap();

    let stay = StayRange::new(d(2, 14), d(2, 17));
    let request = |tentative| ReservationRequest {
        target: ReservationTarget::RoomType(rt.id),
        guest_name: "Sam Rey".into(),
        range: stay,
        guests: GuestCounts::new(2, 0),
        occupancy: OccupancyType::Double,
        tentative,
    };

    // Guest A takes a tentative hold on the last unit.
    let hold = engine.create_reservation(request(true), now()).await.unwrap();

    // Guest B is turned away while the hold is live.
    let err = engine
        .create_reservation(request(false), now() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));

    // Guest A never converts; after the 48h window guest B gets the unit
    // even though no sweep has run.
    let late = now() + Duration::hours(50);
    let booking = engine.create_reservation(request(false), late).await.unwrap();
    assert_eq!(booking.status, ReservationStatus::Pending);

    // Guest A's eventual conversion attempt fails.
    let err = engine.convert_hold(hold.id, late).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::NotTentative {
            status: ReservationStatus::Expired,
            ..
        }
    ));

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn restart_preserves_bookings_and_references() {
    let path = tmp_wal("restart");
    let rt = family_type();
    let reference;
    {
        let engine = new_engine(&path);
        engine.create_room_type(rt.clone()).await.unwrap();
        let booking = engine
            .create_reservation(
                ReservationRequest {
                    target: ReservationTarget::RoomType(rt.id),
                    guest_name: "Noor Haddad".into(),
                    range: StayRange::new(d(2, 14), d(2, 17)),
                    guests: GuestCounts::new(2, 0),
                    occupancy: OccupancyType::Double,
                    tentative: false,
                },
                now(),
            )
            .await
            .unwrap();
        reference = booking.reference.clone();
    }

    let engine = new_engine(&path);
    let restored = engine.find_by_reference(&reference).await.unwrap();
    assert_eq!(restored.guest_name, "Noor Haddad");
    assert_eq!(restored.price.nights, 3);

    let types = engine.list_room_types().await;
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].name, "Family Room");

    let _ = fs::remove_file(&path);
}
