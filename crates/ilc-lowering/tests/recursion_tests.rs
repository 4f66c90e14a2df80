use super::*;

#[test]
fn test_enter_leave() {
    let mut guard: RecursionGuard<u32> = RecursionGuard::new(4, 100);
    assert!(guard.enter(1).is_entered());
    assert!(guard.enter(2).is_entered());
    assert_eq!(guard.depth(), 2);
    assert_eq!(guard.path(), &[1, 2]);
    guard.leave(2);
    guard.leave(1);
    assert_eq!(guard.depth(), 0);
    assert_eq!(guard.iterations(), 2);
}

#[test]
fn test_cycle_detection() {
    let mut guard: RecursionGuard<u32> = RecursionGuard::new(10, 100);
    assert!(guard.enter(1).is_entered());
    assert!(guard.enter(2).is_entered());
    assert!(guard.enter(1).is_cycle());
    assert_eq!(guard.cycle_through(1), vec![1, 2, 1]);
    assert_eq!(guard.cycle_through(2), vec![2, 2]);
    assert!(guard.cycle_through(3).is_empty());
    guard.leave(2);
    guard.leave(1);
}

#[test]
fn test_depth_limit() {
    let mut guard: RecursionGuard<u32> = RecursionGuard::new(2, 100);
    assert!(guard.enter(1).is_entered());
    assert!(guard.enter(2).is_entered());
    assert_eq!(guard.enter(3), RecursionResult::DepthExceeded);
    guard.leave(2);
    guard.leave(1);
}

#[test]
fn test_iteration_limit() {
    let mut guard: RecursionGuard<u32> = RecursionGuard::new(10, 3);
    for key in 0..3 {
        assert!(guard.enter(key).is_entered());
        guard.leave(key);
    }
    assert_eq!(guard.enter(9), RecursionResult::IterationExceeded);
    assert!(RecursionResult::IterationExceeded.is_exceeded());
}

#[test]
fn test_scope_pairs_enter_and_leave() {
    let mut guard: RecursionGuard<u32> = RecursionGuard::with_profile(RecursionProfile::CarrierChain);
    let result = guard.scope(7, |g| {
        assert!(g.is_visiting(&7));
        g.scope(7, |_| ()).unwrap_err()
    });
    assert_eq!(result, Ok(RecursionResult::Cycle));
    assert!(!guard.is_visiting(&7));
}

#[test]
fn test_profiles() {
    assert_eq!(
        RecursionProfile::CarrierChain.max_depth(),
        ilc_common::limits::MAX_CARRIER_CHAIN_DEPTH
    );
    assert_eq!(RecursionProfile::TypeParameterBounds.max_depth(), 32);
    let custom = RecursionProfile::Custom {
        max_depth: 3,
        max_iterations: 9,
    };
    assert_eq!(custom.max_depth(), 3);
    assert_eq!(custom.max_iterations(), 9);
}
