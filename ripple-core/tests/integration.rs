//! Integration Tests for the Reactive Engine
//!
//! These tests drive values, expressions and observers together through the
//! public API, the way a host would.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;

use ripple_core::reactive::{Expression, NodeId, NodeState, Runtime, Value};
use ripple_core::{ReactiveError, RuntimeConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Value x=5, expression double=x*2, observer o records double.
#[test]
fn double_scenario() {
    init_tracing();
    let rt = Runtime::new();
    let x = rt.create_value(5);
    let double = {
        let x = x.clone();
        rt.create_expression(move || Ok(x.get()? * 2))
    };
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let o = {
        let double = double.clone();
        let recorded = recorded.clone();
        rt.create_observer(0, move || {
            recorded.lock().push(double.get()?);
            Ok(())
        })
    };

    rt.request_flush().unwrap();
    assert_eq!(*recorded.lock(), vec![10]);

    x.set(7).unwrap();
    assert_eq!(double.state().unwrap(), NodeState::Invalidated);
    assert_eq!(o.state().unwrap(), NodeState::Invalidated);

    rt.request_flush().unwrap();
    assert_eq!(*recorded.lock(), vec![10, 14]);
    assert_eq!(double.cached().unwrap(), Some(14));
}

#[test]
fn higher_priority_observer_runs_first() {
    let rt = Runtime::new();
    let trigger = rt.create_value(0);
    let order = Arc::new(Mutex::new(Vec::new()));

    let make = |name: &'static str, priority: i32| {
        let trigger = trigger.clone();
        let order = order.clone();
        rt.create_observer(priority, move || {
            trigger.get()?;
            order.lock().push(name);
            Ok(())
        })
    };
    // Created low first so creation order cannot explain the result.
    let _o2 = make("o2", 1);
    let _o1 = make("o1", 10);

    rt.request_flush().unwrap();
    assert_eq!(*order.lock(), vec!["o1", "o2"]);

    order.lock().clear();
    trigger.set(1).unwrap();
    rt.request_flush().unwrap();
    assert_eq!(*order.lock(), vec!["o1", "o2"]);
}

#[test]
fn equal_priorities_are_an_unordered_set() {
    let rt = Runtime::new();
    let ran = Arc::new(Mutex::new(HashSet::new()));
    for i in 0..5 {
        let ran = ran.clone();
        rt.create_observer(0, move || {
            ran.lock().insert(i);
            Ok(())
        });
    }

    let batch = rt.request_flush().unwrap();

    assert_eq!(batch.observers_run, 5);
    assert_eq!(*ran.lock(), (0..5).collect::<HashSet<_>>());
}

#[test]
fn dependency_free_expression_runs_once() {
    let rt = Runtime::new();
    let runs = Arc::new(AtomicI32::new(0));
    let constant = {
        let runs = runs.clone();
        rt.create_expression(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok("constant")
        })
    };

    assert_eq!(rt.isolate(|| constant.get()).unwrap(), "constant");
    assert_eq!(rt.isolate(|| constant.get()).unwrap(), "constant");
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn reads_outside_consumers_fail() {
    let rt = Runtime::new();
    let x = rt.create_value(1);
    let e = {
        let x = x.clone();
        rt.create_expression(move || x.get())
    };

    assert!(matches!(x.get(), Err(ReactiveError::AccessViolation { .. })));
    assert!(matches!(e.get(), Err(ReactiveError::AccessViolation { .. })));
    // A rejected read must not have run the body.
    assert_eq!(e.cached().unwrap(), None);
}

#[test]
fn diamond_invalidates_and_reruns_once() {
    let rt = Runtime::new();
    let x = rt.create_value(1);
    let left_runs = Arc::new(AtomicI32::new(0));
    let right_runs = Arc::new(AtomicI32::new(0));

    let left = {
        let (x, runs) = (x.clone(), left_runs.clone());
        rt.create_expression(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(x.get()? + 1)
        })
    };
    let right = {
        let (x, runs) = (x.clone(), right_runs.clone());
        rt.create_expression(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(x.get()? * 10)
        })
    };
    let invalidations = Arc::new(AtomicI32::new(0));
    let o = {
        let weak = rt.downgrade();
        let invalidations = invalidations.clone();
        rt.create_observer(0, move || {
            let sum = left.get()? + right.get()?;
            let invalidations = invalidations.clone();
            weak.on_invalidate(move || {
                invalidations.fetch_add(1, Ordering::SeqCst);
            })?;
            weak.emit("sum", sum)
        })
    };

    let batch = rt.request_flush().unwrap();
    assert_eq!(batch.outputs["sum"], 12);

    x.set(2).unwrap();
    assert_eq!(invalidations.load(Ordering::SeqCst), 1);
    assert_eq!(o.state().unwrap(), NodeState::Invalidated);

    let batch = rt.request_flush().unwrap();
    assert_eq!(batch.observers_run, 1);
    assert_eq!(batch.outputs["sum"], 23);
    assert_eq!(left_runs.load(Ordering::SeqCst), 2);
    assert_eq!(right_runs.load(Ordering::SeqCst), 2);
    assert_eq!(o.run_count().unwrap(), 2);
}

#[test]
fn write_reaches_only_its_descendants() {
    let rt = Runtime::new();
    let a = rt.create_value(1);
    let b = rt.create_value(1);
    let from_a = {
        let a = a.clone();
        rt.create_expression(move || a.get())
    };
    let oa = {
        let from_a = from_a.clone();
        rt.create_observer(0, move || from_a.get().map(|_| ()))
    };
    let ob = {
        let b = b.clone();
        rt.create_observer(0, move || b.get().map(|_| ()))
    };
    rt.request_flush().unwrap();

    a.set(2).unwrap();

    assert_eq!(from_a.state().unwrap(), NodeState::Invalidated);
    assert_eq!(oa.state().unwrap(), NodeState::Invalidated);
    assert_eq!(ob.state().unwrap(), NodeState::Valid);

    // No edges remain on invalidated nodes; b's edge survives.
    assert!(rt.dependents(a.id()).is_empty());
    assert!(rt.dependencies(from_a.id()).is_empty());
    assert!(rt.dependents(from_a.id()).is_empty());
    assert!(rt.dependencies(oa.id()).is_empty());
    assert_eq!(rt.dependents(b.id()), vec![ob.id()]);
    assert_eq!(rt.edge_count(), 1);
}

#[test]
fn outputs_are_released_as_one_batch() {
    let rt = Runtime::new();
    let x = rt.create_value(1);

    for (name, priority) in [("first", 2), ("second", 1)] {
        let x = x.clone();
        let weak = rt.downgrade();
        rt.create_observer(priority, move || weak.emit(name, x.get()?));
    }
    let mid_flush = Arc::new(AtomicI32::new(0));
    {
        let weak = rt.downgrade();
        let mid_flush = mid_flush.clone();
        rt.create_observer(0, move || {
            let rt = weak.upgrade().ok_or(ReactiveError::SessionClosed)?;
            if rt.is_flushing() {
                mid_flush.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });
    }

    let batch = rt.request_flush().unwrap();
    assert_eq!(mid_flush.load(Ordering::SeqCst), 1);
    assert!(!rt.is_flushing());
    assert_eq!(batch.outputs.keys().collect::<Vec<_>>(), vec!["first", "second"]);

    // Nothing is pending, so the next cycle has an empty batch.
    let batch = rt.request_flush().unwrap();
    assert!(batch.is_empty());
    assert_eq!(batch.cycle, 2);
}

#[test]
fn latest_emission_wins_within_a_cycle() {
    let rt = Runtime::new();
    let step = rt.create_value(0);
    {
        let step = step.clone();
        let weak = rt.downgrade();
        rt.create_observer(0, move || {
            let v = step.get()?;
            weak.emit("step", v)?;
            if v < 2 {
                step.set(v + 1)?;
            }
            Ok(())
        });
    }

    let batch = rt.request_flush().unwrap();

    assert_eq!(batch.outputs.len(), 1);
    assert_eq!(batch.outputs["step"], 2);
    assert_eq!(batch.observers_run, 3);
}

#[test]
fn failing_observer_does_not_block_others() {
    let rt = Runtime::new();
    let x = rt.create_value(0);
    let healthy_runs = Arc::new(AtomicI32::new(0));

    let broken = {
        let x = x.clone();
        rt.create_observer(5, move || {
            if x.get()? == 0 {
                Err(ReactiveError::failed("x must not be zero"))
            } else {
                Ok(())
            }
        })
    };
    {
        let x = x.clone();
        let healthy_runs = healthy_runs.clone();
        rt.create_observer(0, move || {
            x.get()?;
            healthy_runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let batch = rt.request_flush().unwrap();
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].observer, broken.id());
    assert!(matches!(
        batch.failures[0].error.root_cause(),
        ReactiveError::Failed(msg) if msg == "x must not be zero"
    ));
    assert_eq!(healthy_runs.load(Ordering::SeqCst), 1);
    assert_eq!(broken.state().unwrap(), NodeState::Invalidated);
    assert!(rt.dependencies(broken.id()).is_empty());

    // Retried on the next flush, and succeeds once x is fixed.
    x.set(1).unwrap();
    let batch = rt.request_flush().unwrap();
    assert!(batch.failures.is_empty());
    assert_eq!(broken.state().unwrap(), NodeState::Valid);
    assert_eq!(healthy_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn expression_error_surfaces_in_reading_observer() {
    let rt = Runtime::new();
    let divisor = rt.create_value(0);
    let ratio = {
        let divisor = divisor.clone();
        rt.create_expression(move || {
            let d = divisor.get()?;
            if d == 0 {
                return Err(ReactiveError::failed("division by zero"));
            }
            Ok(100 / d)
        })
    };
    let o = {
        let ratio = ratio.clone();
        let weak = rt.downgrade();
        rt.create_observer(0, move || weak.emit("ratio", ratio.get()?))
    };

    let batch = rt.request_flush().unwrap();
    let failure = &batch.failures[0];
    assert_eq!(failure.observer, o.id());
    match &failure.error {
        ReactiveError::ConsumerExecution { node, source } => {
            assert_eq!(*node, o.id());
            assert!(matches!(
                source.as_ref(),
                ReactiveError::ConsumerExecution { node, .. } if *node == ratio.id()
            ));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(ratio.state().unwrap(), NodeState::Invalidated);

    divisor.set(4).unwrap();
    let batch = rt.request_flush().unwrap();
    assert_eq!(batch.outputs["ratio"], 25);
}

#[test]
fn value_changing_mid_expression_is_not_cached() {
    let rt = Runtime::new();
    let x = rt.create_value(1);
    let runs = Arc::new(AtomicI32::new(0));
    // Impure on purpose: bumps its own input the first time it runs.
    let bumper = {
        let x = x.clone();
        let runs = runs.clone();
        rt.create_expression(move || {
            let v = x.get()?;
            if runs.fetch_add(1, Ordering::SeqCst) == 0 {
                x.set(v + 1)?;
            }
            Ok(v)
        })
    };

    assert_eq!(rt.isolate(|| bumper.get()).unwrap(), 1);
    assert_eq!(bumper.state().unwrap(), NodeState::Invalidated);
    assert_eq!(bumper.cached().unwrap(), None);

    assert_eq!(rt.isolate(|| bumper.get()).unwrap(), 2);
    assert_eq!(bumper.state().unwrap(), NodeState::Valid);
}

#[test]
fn sessions_are_independent() {
    let rt1 = Runtime::new();
    let rt2 = Runtime::new();
    let x1 = rt1.create_value(1);
    let x2 = rt2.create_value(2);

    let v = rt1.isolate(|| {
        // rt2 has no active context even while rt1 does.
        assert!(matches!(x2.get(), Err(ReactiveError::AccessViolation { .. })));
        x1.get()
    });

    assert_eq!(v.unwrap(), 1);
}

#[test]
fn sessions_run_in_parallel() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let rt = Runtime::new();
                let x = rt.create_value(i);
                {
                    let x = x.clone();
                    let weak = rt.downgrade();
                    rt.create_observer(0, move || weak.emit("x", x.get()?));
                }
                let mut seen = Vec::new();
                for step in 0..50 {
                    x.set(i * 1000 + step).unwrap();
                    let batch = rt.request_flush().unwrap();
                    seen.push(batch.outputs["x"].as_i64().unwrap());
                }
                seen
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let seen = handle.join().unwrap();
        let expected: Vec<i64> = (0..50).map(|step| i as i64 * 1000 + step).collect();
        assert_eq!(seen, expected);
    }
}

#[test]
fn other_threads_wait_for_a_running_flush() {
    let rt = Runtime::new();
    let a = rt.create_value(0);
    let b = rt.create_value(0);
    let started = Arc::new(Barrier::new(2));
    let log = Arc::new(Mutex::new(Vec::new()));
    let first_run = Arc::new(AtomicBool::new(true));

    let obs = {
        let (a, b) = (a.clone(), b.clone());
        let (started, log) = (started.clone(), log.clone());
        rt.create_observer(0, move || {
            a.get()?;
            if first_run.swap(false, Ordering::SeqCst) {
                // Let the host thread try to cut in between the two reads.
                started.wait();
                std::thread::sleep(Duration::from_millis(50));
            }
            b.get()?;
            log.lock().push("observer");
            Ok(())
        })
    };

    let host = {
        let rt = rt.clone();
        let (started, log) = (started.clone(), log.clone());
        std::thread::spawn(move || {
            started.wait();
            rt.isolate(|| {
                log.lock().push("host");
                Ok(())
            })
        })
    };

    rt.request_flush().unwrap();
    host.join().unwrap().unwrap();

    assert_eq!(*log.lock(), vec!["observer", "host"]);
    assert_eq!(rt.dependencies(obs.id()), vec![a.id(), b.id()]);

    b.set(1).unwrap();
    assert_eq!(obs.state().unwrap(), NodeState::Invalidated);
}

#[test]
fn config_from_json_limits_depth() {
    let config = RuntimeConfig::from_json(r#"{ "max_depth": 2 }"#).unwrap();
    let rt = Runtime::with_config(config);
    let inner = rt.create_expression(|| Ok(1));
    let outer = {
        let inner = inner.clone();
        rt.create_expression(move || inner.get())
    };

    let err = rt.isolate(|| outer.get()).unwrap_err();
    assert!(matches!(err.root_cause(), ReactiveError::UnboundedRecursion { limit: 2 }));
    assert!(rt.current_context().is_none());
}

// ----------------------------------------------------------------------------
// Property: a write invalidates exactly what is reachable from it
// ----------------------------------------------------------------------------

#[derive(Clone)]
enum Source {
    Value(Value<i64>),
    Expression(Expression<i64>),
}

impl Source {
    fn get(&self) -> ripple_core::Result<i64> {
        match self {
            Source::Value(v) => v.get(),
            Source::Expression(e) => e.get(),
        }
    }

    fn id(&self) -> NodeId {
        match self {
            Source::Value(v) => v.id(),
            Source::Expression(e) => e.id(),
        }
    }
}

#[derive(Debug, Clone)]
struct Shape {
    values: usize,
    expressions: Vec<Vec<prop::sample::Index>>,
    observers: Vec<Vec<prop::sample::Index>>,
    written: prop::sample::Index,
}

fn shapes() -> impl Strategy<Value = Shape> {
    let reads = || prop::collection::vec(any::<prop::sample::Index>(), 0..4);
    (
        1..4_usize,
        prop::collection::vec(reads(), 0..8),
        prop::collection::vec(reads(), 1..5),
        any::<prop::sample::Index>(),
    )
        .prop_map(|(values, expressions, observers, written)| Shape {
            values,
            expressions,
            observers,
            written,
        })
}

proptest! {
    #[test]
    fn write_invalidates_exactly_reachable_nodes(shape in shapes()) {
        let rt = Runtime::new();
        let mut sources: Vec<Source> = (0..shape.values)
            .map(|i| Source::Value(rt.create_value(i as i64)))
            .collect();
        // reads[node] = sources that node reads, by id
        let mut reads: Vec<(NodeId, Vec<NodeId>)> = Vec::new();

        for picks in &shape.expressions {
            let inputs: Vec<Source> = picks.iter().map(|ix| ix.get(&sources).clone()).collect();
            let ids = inputs.iter().map(Source::id).collect();
            let expr = rt.create_expression(move || {
                let mut sum = 0_i64;
                for s in &inputs {
                    sum += s.get()?;
                }
                Ok(sum)
            });
            reads.push((expr.id(), ids));
            sources.push(Source::Expression(expr));
        }
        let mut consumers: Vec<NodeId> = reads.iter().map(|(id, _)| *id).collect();
        for picks in &shape.observers {
            let inputs: Vec<Source> = picks.iter().map(|ix| ix.get(&sources).clone()).collect();
            let ids = inputs.iter().map(Source::id).collect();
            let obs = rt.create_observer(0, move || {
                for s in &inputs {
                    s.get()?;
                }
                Ok(())
            });
            reads.push((obs.id(), ids));
            consumers.push(obs.id());
        }

        let batch = rt.request_flush().unwrap();
        prop_assert!(batch.failures.is_empty());

        let written = shape.written.index(shape.values);
        let written_id = sources[written].id();

        // Forward reachability over the static read relation.
        let mut reachable: HashSet<NodeId> = HashSet::new();
        let mut frontier = vec![written_id];
        while let Some(src) = frontier.pop() {
            for (node, inputs) in &reads {
                if inputs.contains(&src) && reachable.insert(*node) {
                    frontier.push(*node);
                }
            }
        }

        let before: Vec<_> = consumers.iter().map(|id| rt.state(*id)).collect();
        match &sources[written] {
            Source::Value(v) => v.set(-1).unwrap(),
            Source::Expression(_) => unreachable!(),
        }

        for (id, was) in consumers.iter().zip(before) {
            let now = rt.state(*id);
            // Expressions no observer reads are never evaluated and stay
            // invalidated throughout.
            let expected = if was == Some(NodeState::Invalidated) || reachable.contains(id) {
                NodeState::Invalidated
            } else {
                NodeState::Valid
            };
            prop_assert_eq!(now, Some(expected));
            if expected == NodeState::Invalidated {
                prop_assert!(rt.dependencies(*id).is_empty());
                prop_assert!(rt.dependents(*id).is_empty());
            }
        }
        prop_assert!(rt.dependents(written_id).is_empty());

        // And a flush brings every observer back to rest.
        let batch = rt.request_flush().unwrap();
        prop_assert!(batch.failures.is_empty());
        prop_assert_eq!(rt.pending_observers(), 0);
    }
}
