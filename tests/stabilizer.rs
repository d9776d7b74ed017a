use brickseek::{BoundingBox, DetectionResult, StabilizerParams, TemporalStabilizer};

fn det(id: &str, x: i32) -> DetectionResult {
    DetectionResult::new(id, BoundingBox::new(x, 0, 20, 20), 0.9).expect("valid detection")
}

fn stabilizer() -> TemporalStabilizer {
    TemporalStabilizer::new(StabilizerParams::default())
}

#[test]
fn identity_in_two_of_three_frames_is_stable() {
    let mut s = stabilizer();
    s.push(vec![det("3005", 10)]);
    s.push(Vec::new());
    s.push(vec![det("3005", 12)]);

    let stable = s.stable();
    assert_eq!(stable.len(), 1);
    assert_eq!(stable[0].part_id, "3005");
    // Most recent occurrence wins.
    assert_eq!(stable[0].bbox.x, 12);
}

#[test]
fn identity_in_one_of_three_frames_is_not_stable() {
    let mut s = stabilizer();
    s.push(vec![det("3005", 10)]);
    s.push(Vec::new());
    s.push(Vec::new());

    assert!(s.stable().is_empty());
}

#[test]
fn quorum_looks_only_at_recent_frames() {
    let mut s = stabilizer();
    s.push(vec![det("3005", 10)]);
    s.push(vec![det("3005", 11)]);
    s.push(Vec::new());
    s.push(Vec::new());

    // The two sightings have aged out of the 3-frame quorum window.
    assert!(s.stable().is_empty());
}

#[test]
fn window_evicts_beyond_capacity() {
    let mut s = stabilizer();
    s.push(vec![det("old", 0)]);
    for i in 0..10 {
        s.push(vec![det("3005", i)]);
    }

    assert_eq!(s.len(), 10);
    let stable = s.stable();
    assert_eq!(stable.len(), 1);
    assert_eq!(stable[0].part_id, "3005");
}

#[test]
fn distinct_identities_are_reported_independently() {
    let mut s = stabilizer();
    s.push(vec![det("3005", 10), det("3020", 100)]);
    s.push(vec![det("3005", 11)]);
    s.push(vec![det("3020", 101)]);

    let stable = s.stable();
    assert_eq!(stable.len(), 2);
    let ids: Vec<&str> = stable.iter().map(|d| d.part_id.as_str()).collect();
    assert!(ids.contains(&"3005"));
    assert!(ids.contains(&"3020"));
}

#[test]
fn clear_resets_the_window() {
    let mut s = stabilizer();
    for _ in 0..3 {
        s.push(vec![det("3005", 10)]);
    }
    assert!(!s.stable().is_empty());

    s.clear();
    assert!(s.is_empty());
    assert!(s.stable().is_empty());
}
