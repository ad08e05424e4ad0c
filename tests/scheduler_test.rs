use spindle::{Runtime, RuntimeConfig, RuntimeError};
use std::ops::ControlFlow;

/// `RUST_LOG=spindle=trace cargo test` shows the scheduler's decisions.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn first_n(rt: &mut Runtime, root: spindle::NodeId, n: usize) -> (Vec<String>, spindle::EvalStats) {
    let mut out = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            out.push(rt.show(v));
            if out.len() >= n {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
    (out, stats)
}

#[test]
fn test_values_come_out_left_to_right() {
    init_logging();
    // (1 ? 2) + 10
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let one = rt.int(1).unwrap();
    let two = rt.int(2).unwrap();
    let ten = rt.int(10).unwrap();
    let either = rt.make(p.choice, &[one, two]).unwrap();
    let root = rt.make(p.add, &[either, ten]).unwrap();

    let mut seen = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            seen.push((rt.int_value(v), rt.pending_frames()));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(seen, vec![(Some(11), 2), (Some(12), 1)]);
    assert_eq!(rt.pending_frames(), 0);
    assert_eq!(stats.solutions, 2);
    assert_eq!(stats.forks, 1);
    assert_eq!(stats.failures, 0);
    assert!(stats.steps > 0);
}

#[test]
fn test_breadth_first_over_two_choices() {
    // (1 ? 2) + (10 ? 20)
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let nums: Vec<_> = [1, 2, 10, 20].iter().map(|&v| rt.int(v).unwrap()).collect();
    let c1 = rt.make(p.choice, &[nums[0], nums[1]]).unwrap();
    let c2 = rt.make(p.choice, &[nums[2], nums[3]]).unwrap();
    let root = rt.make(p.add, &[c1, c2]).unwrap();

    assert_eq!(rt.values(root).unwrap(), vec!["11", "21", "12", "22"]);
}

#[test]
fn test_non_terminating_branch_does_not_starve() {
    init_logging();
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let spin = rt.make(p.loop_, &[]).unwrap();
    let seven = rt.int(7).unwrap();
    let root = rt.make(p.choice, &[spin, seven]).unwrap();

    let (values, stats) = first_n(&mut rt, root, 1);
    assert_eq!(values, vec!["7"]);
    assert!(stats.preemptions >= 1);
}

#[test]
fn test_step_limit_stops_endless_search() {
    let cfg = RuntimeConfig {
        slice_steps: 100,
        step_limit: Some(1_000),
        ..RuntimeConfig::default()
    };
    let mut rt = Runtime::new(cfg).unwrap();
    let p = rt.prelude();
    let spin = rt.make(p.loop_, &[]).unwrap();
    let seven = rt.int(7).unwrap();
    let root = rt.make(p.choice, &[seven, spin]).unwrap();

    let mut values = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            values.push(rt.show(v));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(values, vec!["7"]);
    assert!(stats.step_limit_hit);
    assert!(stats.steps <= 1_000);
}

#[test]
fn test_break_abandons_remaining_alternatives() {
    // 1 ? (2 ? 3)
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let nums: Vec<_> = (1..=3).map(|v| rt.int(v).unwrap()).collect();
    let inner = rt.make(p.choice, &[nums[1], nums[2]]).unwrap();
    let root = rt.make(p.choice, &[nums[0], inner]).unwrap();

    let (values, stats) = first_n(&mut rt, root, 2);
    assert_eq!(values, vec!["1", "2"]);
    assert_eq!(stats.solutions, 2);
}

#[test]
fn test_failed_branches_are_dropped() {
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let bad = rt.make(p.failed, &[]).unwrap();
    let five = rt.int(5).unwrap();
    let root = rt.make(p.choice, &[bad, five]).unwrap();

    let mut values = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            values.push(rt.show(v));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(values, vec!["5"]);
    assert_eq!(stats.failures, 1);
}

#[test]
fn test_function_at_root_is_discarded() {
    init_logging();
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let add = rt.function_value(p.add).unwrap();
    let one = rt.int(1).unwrap();
    let partial = rt.make(p.apply, &[add, one]).unwrap();
    let two = rt.int(2).unwrap();
    let root = rt.make(p.choice, &[partial, two]).unwrap();

    let mut values = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            values.push(rt.show(v));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(values, vec!["2"]);
    assert_eq!(stats.violations, 1);
    assert_eq!(stats.solutions, 1);
}

#[test]
fn test_floundering_frames_are_dropped() {
    init_logging();
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let u = rt.free_var(None).unwrap();
    let stuck = rt.make(p.ensure_not_free, &[u]).unwrap();
    let five = rt.int(5).unwrap();
    let root = rt.make(p.choice, &[stuck, five]).unwrap();

    let mut values = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            values.push(rt.show(v));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(values, vec!["5"]);
    assert_eq!(stats.floundered, 1);
}

#[test]
fn test_search_flounders_once_every_frame_waits() {
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let u = rt.free_var(None).unwrap();
    let v = rt.free_var(None).unwrap();
    let eu = rt.make(p.ensure_not_free, &[u]).unwrap();
    let ev = rt.make(p.ensure_not_free, &[v]).unwrap();
    let root = rt.make(p.choice, &[eu, ev]).unwrap();

    let stats = rt.evaluate(root, |_, _| ControlFlow::Continue(())).unwrap();
    assert_eq!(stats.solutions, 0);
    assert_eq!(stats.floundered, 2);
    assert_eq!(rt.pending_frames(), 0);
}

#[test]
fn test_free_variable_is_a_value() {
    let mut rt = Runtime::default();
    let x = rt.free_var(None).unwrap();
    let values = rt.values(x).unwrap();
    assert_eq!(values, vec![format!("_x{}", rt.aux(x))]);
}

#[test]
fn test_exhaustion_reaches_the_host() {
    // Seven live nodes in an eight slot pool; the pull-tab needs two more.
    let mut rt = Runtime::new(RuntimeConfig::with_fixed_pool(8)).unwrap();
    let p = rt.prelude();
    let nums: Vec<_> = (1..=4).map(|v| rt.int(v).unwrap()).collect();
    let c1 = rt.choice(nums[0], nums[1]).unwrap();
    let c2 = rt.choice(nums[2], nums[3]).unwrap();
    let root = rt.make(p.pair, &[c1, c2]).unwrap();

    let res = rt.evaluate(root, |_, _| ControlFlow::Continue(()));
    assert!(matches!(res, Err(RuntimeError::Exhausted { .. })));
}

#[test]
fn test_runtime_is_reusable_after_evaluation() {
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let one = rt.int(1).unwrap();
    let two = rt.int(2).unwrap();
    let root = rt.make(p.choice, &[one, two]).unwrap();
    assert_eq!(rt.values(root).unwrap(), vec!["1", "2"]);

    // The first evaluation left the runtime ready for another.
    let three = rt.int(3).unwrap();
    let sum = rt.make(p.add, &[root, three]).unwrap();
    assert_eq!(rt.values(sum).unwrap(), vec!["4", "5"]);
}
