//! Behavioural tests for single-target matching and batch runs.

use std::cell::RefCell;

use carpool_core::route::StopKind;
use carpool_core::test_support::{
    FixedClock, MemoryRideStore, OptInBuilder, RecordingNotifier, base_coord, offset_north,
};
use carpool_core::{OptIn, OptInStatus};
use carpool_matcher::{
    BatchAction, BatchOptions, BatchReport, MatchConfig, MatchError, MatchOutcome, Matcher,
    NoMatchReason,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

type TestMatcher = Matcher<MemoryRideStore, RecordingNotifier, FixedClock>;

#[derive(Default)]
struct MatchWorld {
    opt_ins: RefCell<Vec<OptIn>>,
    matcher: RefCell<Option<TestMatcher>>,
    outcome: RefCell<Option<Result<MatchOutcome, MatchError>>>,
    report: RefCell<Option<Result<BatchReport, MatchError>>>,
}

impl MatchWorld {
    fn matcher(&self) -> std::cell::RefMut<'_, Option<TestMatcher>> {
        let mut slot = self.matcher.borrow_mut();
        if slot.is_none() {
            let store = MemoryRideStore::with_opt_ins(self.opt_ins.borrow().iter().cloned());
            let config = MatchConfig::new(offset_north(base_coord(), 5.0));
            *slot = Some(Matcher::new(
                store,
                RecordingNotifier::default(),
                FixedClock::default(),
                config,
            ));
        }
        slot
    }

    fn outcome(&self) -> MatchOutcome {
        self.outcome
            .borrow()
            .clone()
            .expect("matches should be requested")
            .expect("matching should succeed")
    }

    fn report(&self) -> BatchReport {
        self.report
            .borrow()
            .clone()
            .expect("batch should run")
            .expect("batch should succeed")
    }

    fn run_batch(&self, dry_run: bool) {
        let guard = self.matcher();
        let matcher = guard.as_ref().expect("matcher initialised");
        let report = matcher.run_batch(OptInBuilder::default_date(), BatchOptions { dry_run });
        self.report.replace(Some(report));
    }
}

#[fixture]
fn world() -> MatchWorld {
    MatchWorld::default()
}

// --- Given steps ---

#[given("a rider leaving between 08:00 and 08:30")]
fn given_rider(world: &MatchWorld) {
    world
        .opt_ins
        .borrow_mut()
        .push(OptInBuilder::rider(1, 1).window("08:00", "08:30").build());
}

#[given("a driver with four seats 1.5 km away leaving between 08:10 and 08:40")]
fn given_near_driver(world: &MatchWorld) {
    world.opt_ins.borrow_mut().push(
        OptInBuilder::driver(2, 2, 4)
            .window("08:10", "08:40")
            .km_north(1.5)
            .build(),
    );
}

#[given("a driver with four seats 12 km away leaving between 08:10 and 08:40")]
fn given_far_driver(world: &MatchWorld) {
    world.opt_ins.borrow_mut().push(
        OptInBuilder::driver(2, 2, 4)
            .window("08:10", "08:40")
            .km_north(12.0)
            .build(),
    );
}

#[given("a driver with one seat and two riders close by")]
fn given_contested_seat(world: &MatchWorld) {
    world.opt_ins.borrow_mut().extend([
        OptInBuilder::driver(1, 1, 1).window("07:30", "09:00").build(),
        OptInBuilder::rider(2, 2)
            .window("07:30", "09:00")
            .km_north(1.0)
            .build(),
        OptInBuilder::rider(3, 3)
            .window("07:30", "09:00")
            .km_north(0.5)
            .build(),
    ]);
}

// --- When steps ---

#[when("matches are requested for the rider")]
fn when_matching(world: &MatchWorld) {
    let guard = world.matcher();
    let matcher = guard.as_ref().expect("matcher initialised");
    world.outcome.replace(Some(matcher.find_matches(1)));
}

#[when("the batch runs for the commute date")]
fn when_batch(world: &MatchWorld) {
    world.run_batch(false);
}

#[when("a dry-run batch runs for the commute date")]
fn when_dry_run(world: &MatchWorld) {
    world.run_batch(true);
}

// --- Then steps ---

#[then("exactly one candidate is returned")]
fn then_one_candidate(world: &MatchWorld) {
    assert_eq!(world.outcome().candidates.len(), 1);
}

#[then("the candidate scores 75")]
fn then_scores(world: &MatchWorld) {
    let outcome = world.outcome();
    let candidate = outcome.candidates.first().expect("one candidate");
    assert_eq!(candidate.score(), 75);
    assert_eq!(candidate.confidence.overlap_bonus, 0);
    assert_eq!(candidate.confidence.distance_term, 20);
}

#[then("the route visits both pickups before the destination")]
fn then_route(world: &MatchWorld) {
    let outcome = world.outcome();
    let candidate = outcome.candidates.first().expect("one candidate");
    let kinds: Vec<StopKind> = candidate
        .route
        .ordered_waypoints
        .iter()
        .map(|stop| stop.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            StopKind::Start { opt_in_id: 2 },
            StopKind::Pickup { opt_in_id: 1 },
            StopKind::Destination,
        ]
    );
}

#[then("no candidate is returned because nobody is compatible")]
fn then_no_candidate(world: &MatchWorld) {
    let outcome = world.outcome();
    assert!(outcome.candidates.is_empty());
    assert_eq!(outcome.reason, Some(NoMatchReason::NoCompatibleOptIns));
}

#[then("one ride is created for the driver and the first rider")]
fn then_one_ride(world: &MatchWorld) {
    let report = world.report();
    assert_eq!(report.rides_created, 1);
    let decision = report.decisions.first().expect("one decision");
    assert_eq!(decision.opt_in_ids, vec![1, 2]);
    assert!(matches!(decision.action, BatchAction::Created { .. }));
    assert!(report.errors.is_empty());
}

#[then("the second rider is still pending")]
fn then_second_pending(world: &MatchWorld) {
    let guard = world.matcher();
    let matcher = guard.as_ref().expect("matcher initialised");
    assert_eq!(matcher.store().opt_in_status(3), Some(OptInStatus::Pending));
    assert_eq!(matcher.store().opt_in_status(2), Some(OptInStatus::Matched));
}

#[then("one ride would be created")]
fn then_would_create(world: &MatchWorld) {
    let report = world.report();
    assert!(report.dry_run);
    assert_eq!(report.rides_created, 0);
    assert_eq!(report.decisions.len(), 1);
    assert_eq!(
        report.decisions.first().map(|d| d.action.clone()),
        Some(BatchAction::WouldCreate)
    );
}

#[then("no ride is stored")]
fn then_no_ride(world: &MatchWorld) {
    let guard = world.matcher();
    let matcher = guard.as_ref().expect("matcher initialised");
    assert!(matcher.store().rides().is_empty());
}

// --- Scenario registrations ---

#[scenario(path = "tests/features/matching.feature", index = 0)]
fn nearby_driver_is_offered(world: MatchWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/matching.feature", index = 1)]
fn distant_driver_is_never_scored(world: MatchWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/matching.feature", index = 2)]
fn batch_claims_each_seat_once(world: MatchWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/matching.feature", index = 3)]
fn dry_run_batch_only_reports(world: MatchWorld) {
    let _ = world;
}
