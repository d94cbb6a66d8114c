//! Import round trip: MSPDI document -> domain model -> CPM matches the
//! hand-computed reference schedule.

use evmsched_parser::import_mspdi;
use evmsched_solver::cpm::{CpmEngine, CpmOptions};
use evmsched_solver::network::ActivityNetwork;

/// Two parallel chains: A(10) -> B(15) -> {C(30), D(25)} -> E(20) -> F(10).
const TWO_CHAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Project>
  <Name>Two Chain Reference</Name>
  <Tasks>
    <Task>
      <UID>1</UID><Name>A</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT80H0M0S</Duration>
      <Start>2026-01-05T08:00:00</Start><Finish>2026-01-16T17:00:00</Finish>
    </Task>
    <Task>
      <UID>2</UID><Name>B</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT120H0M0S</Duration>
      <Start>2026-01-19T08:00:00</Start><Finish>2026-02-06T17:00:00</Finish>
      <PredecessorLink><PredecessorUID>1</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
    </Task>
    <Task>
      <UID>3</UID><Name>C</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT240H0M0S</Duration>
      <Start>2026-02-09T08:00:00</Start><Finish>2026-03-20T17:00:00</Finish>
      <PredecessorLink><PredecessorUID>2</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
    </Task>
    <Task>
      <UID>4</UID><Name>D</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT200H0M0S</Duration>
      <Start>2026-02-09T08:00:00</Start><Finish>2026-03-13T17:00:00</Finish>
      <PredecessorLink><PredecessorUID>2</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
    </Task>
    <Task>
      <UID>5</UID><Name>E</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT160H0M0S</Duration>
      <Start>2026-03-23T08:00:00</Start><Finish>2026-04-17T17:00:00</Finish>
      <PredecessorLink><PredecessorUID>3</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
      <PredecessorLink><PredecessorUID>4</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
    </Task>
    <Task>
      <UID>6</UID><Name>F</Name><OutlineLevel>1</OutlineLevel>
      <Duration>PT80H0M0S</Duration>
      <Start>2026-04-20T08:00:00</Start><Finish>2026-05-01T17:00:00</Finish>
      <PredecessorLink><PredecessorUID>5</PredecessorUID><Type>1</Type><LinkLag>0</LinkLag></PredecessorLink>
    </Task>
  </Tasks>
</Project>"#;

#[test]
fn imported_network_reproduces_reference_schedule() {
    let imported = import_mspdi(TWO_CHAIN, "usr-7").unwrap();
    assert_eq!(imported.activities.len(), 6);
    assert_eq!(imported.dependencies.len(), 6);

    let network =
        ActivityNetwork::from_activities(&imported.activities, &imported.dependencies).unwrap();
    let schedule = CpmEngine::new()
        .schedule(&network, &CpmOptions::default())
        .unwrap();

    assert_eq!(schedule.project_duration, 85);

    let by_name = |name: &str| {
        let activity = imported
            .activities
            .iter()
            .find(|a| a.name == name)
            .unwrap();
        &schedule.results[&activity.id]
    };

    assert_eq!((by_name("A").early_start, by_name("A").early_finish), (0, 10));
    assert_eq!((by_name("B").early_start, by_name("B").early_finish), (10, 25));
    assert_eq!((by_name("C").early_start, by_name("C").early_finish), (25, 55));
    assert_eq!((by_name("D").early_start, by_name("D").early_finish), (25, 50));
    assert_eq!((by_name("E").early_start, by_name("E").early_finish), (55, 75));
    assert_eq!((by_name("F").early_start, by_name("F").early_finish), (75, 85));

    for name in ["A", "B", "C", "E", "F"] {
        assert!(by_name(name).is_critical, "{name} should be critical");
    }
    assert!(!by_name("D").is_critical);
    assert_eq!(by_name("D").total_float, 5);
}

#[test]
fn import_is_deterministic_for_cpm() {
    let first = import_mspdi(TWO_CHAIN, "usr-7").unwrap();
    let second = import_mspdi(TWO_CHAIN, "usr-7").unwrap();

    let duration = |imported: &evmsched_parser::ImportedProgram| {
        let network =
            ActivityNetwork::from_activities(&imported.activities, &imported.dependencies)
                .unwrap();
        CpmEngine::new()
            .schedule(&network, &CpmOptions::default())
            .unwrap()
            .project_duration
    };
    assert_eq!(duration(&first), duration(&second));
}
