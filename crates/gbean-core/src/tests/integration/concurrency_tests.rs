#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use super::common::{EventLog, boot_stack, name};
use crate::kernel::bootstrap::WeakKernel;
use crate::kernel::factory::{FnServiceFactory, ServiceEnvironment, ServiceHandle};
use crate::kernel::name::{NamePattern, ServiceName};
use crate::kernel::state::ServiceState;
use crate::lifecycle::{LifecycleListener, ListenerResult};

const THREADS: usize = 8;
const ROUNDS: usize = 25;

/// Run `threads` to completion, failing instead of hanging on a deadlock
fn join_within_deadline(threads: Vec<thread::JoinHandle<()>>) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for handle in threads {
            handle.join().expect("worker thread panicked");
        }
        let _ = tx.send(());
    });
    rx.recv_timeout(Duration::from_secs(30)).expect("lifecycle threads deadlocked");
}

#[test]
fn test_concurrent_start_stop_keeps_events_paired() {
    let stack = boot_stack("race");
    let events = Arc::new(EventLog::default());
    stack
        .kernel
        .add_lifecycle_listener(events.clone(), vec![NamePattern::new("race/worker").unwrap()]);

    let created = Arc::new(AtomicUsize::new(0));
    let destroyed = Arc::new(AtomicUsize::new(0));
    let factory = {
        let created = created.clone();
        let destroyed = destroyed.clone();
        FnServiceFactory::new("Worker", move |_| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(()) as ServiceHandle)
        })
        .on_destroy(move |_, _| {
            destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let worker = name("race/worker");
    stack
        .kernel
        .load_service(worker.clone(), Arc::new(factory), ServiceEnvironment::new("race"))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let kernel = stack.kernel.clone();
            let worker = worker.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    if (i + round) % 2 == 0 {
                        kernel.start_service(&worker).unwrap();
                    } else {
                        kernel.stop_service(&worker).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }
    stack.kernel.stop_service(&worker).unwrap();

    assert_eq!(stack.kernel.get_service_state(&worker).unwrap(), ServiceState::Stopped);
    let starts = events.count("starting:");
    assert!(starts >= 1);
    assert_eq!(events.count("running:"), starts);
    assert_eq!(events.count("stopping:"), starts);
    assert_eq!(events.count("stopped:"), starts);
    assert_eq!(created.load(Ordering::SeqCst), starts);
    assert_eq!(destroyed.load(Ordering::SeqCst), starts);

    // transitions never interleave
    let entries = events.entries();
    for pair in entries.chunks(4) {
        assert_eq!(
            pair,
            ["starting:race/worker", "running:race/worker", "stopping:race/worker", "stopped:race/worker"]
        );
    }
}

#[test]
fn test_concurrent_loads_and_listener_registration() {
    let stack = boot_stack("race");
    let late = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let kernel = stack.kernel.clone();
            let late = late.clone();
            thread::spawn(move || {
                for j in 0..ROUNDS {
                    let service = name(&format!("race/svc-{}-{}", i, j));
                    kernel
                        .load_service(
                            service.clone(),
                            Arc::new(FnServiceFactory::instance("Unit", ())),
                            ServiceEnvironment::new("race"),
                        )
                        .unwrap();
                    kernel.start_service(&service).unwrap();
                }
                let log = Arc::new(EventLog::default());
                kernel.add_lifecycle_listener(log.clone(), vec![NamePattern::new("race/*").unwrap()]);
                late.fetch_add(1, Ordering::SeqCst);
                log
            })
        })
        .collect();
    let logs: Vec<Arc<EventLog>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("loader thread panicked"))
        .collect();

    assert_eq!(late.load(Ordering::SeqCst), THREADS);
    let loaded = stack.kernel.list_services(&NamePattern::new("race/*").unwrap());
    assert_eq!(loaded.len(), THREADS * ROUNDS);
    assert_eq!(stack.invokers.invoker_count(), 1);
    assert_eq!(stack.bridge.shadow_names().len(), THREADS * ROUNDS + 1);

    stack.kernel.shutdown().unwrap();
    for log in logs {
        assert_eq!(log.count("stopped:"), THREADS * ROUNDS);
        assert_eq!(log.count("unloaded:"), THREADS * ROUNDS);
    }
}

/// Checks on every `running` of a dependent that its dependency is up
struct DependencyWatch {
    kernel: WeakKernel,
    dependency: ServiceName,
    checked: AtomicUsize,
    violations: AtomicUsize,
}

impl LifecycleListener for DependencyWatch {
    fn running(&self, _: &ServiceName) -> ListenerResult {
        let kernel = self.kernel.upgrade().ok_or("kernel dropped")?;
        self.checked.fetch_add(1, Ordering::SeqCst);
        // STOPPING is allowed: a stop that is about to be refused restores RUNNING
        let state = kernel.get_service_state(&self.dependency)?;
        if matches!(state, ServiceState::Stopped | ServiceState::Starting) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[test]
fn test_dependency_never_stops_under_a_starting_dependent() {
    let stack = boot_stack("edge");
    let (parent, child) = (name("edge/parent"), name("edge/child"));
    stack
        .kernel
        .load_service(parent.clone(), Arc::new(FnServiceFactory::instance("Parent", ())), ServiceEnvironment::new("edge"))
        .unwrap();
    stack
        .kernel
        .load_service(
            child.clone(),
            Arc::new(FnServiceFactory::instance("Child", ()).depends_on(parent.clone())),
            ServiceEnvironment::new("edge"),
        )
        .unwrap();
    let watch = Arc::new(DependencyWatch {
        kernel: stack.kernel.downgrade(),
        dependency: parent.clone(),
        checked: AtomicUsize::new(0),
        violations: AtomicUsize::new(0),
    });
    stack.kernel.add_lifecycle_listener(watch.clone(), vec![NamePattern::exact(&child)]);

    let threads = (0..THREADS)
        .map(|i| {
            let kernel = stack.kernel.clone();
            let (parent, child) = (parent.clone(), child.clone());
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    // outcomes race; only the states they leave behind matter
                    if i % 2 == 0 {
                        let _ = kernel.start_service_recursive(&child);
                        let _ = kernel.stop_service(&child);
                    } else {
                        let _ = kernel.stop_service(&parent);
                        let _ = kernel.start_service(&parent);
                    }
                }
            })
        })
        .collect();
    join_within_deadline(threads);

    stack.kernel.start_service_recursive(&child).unwrap();
    assert!(watch.checked.load(Ordering::SeqCst) >= 1);
    assert_eq!(watch.violations.load(Ordering::SeqCst), 0);
    assert_eq!(stack.kernel.get_service_state(&child).unwrap(), ServiceState::Running);
    assert_eq!(stack.kernel.get_service_state(&parent).unwrap(), ServiceState::Running);
    assert!(stack.kernel.stop_service(&parent).is_err());
}

/// On `running` of its service, tries to stop that service and a peer
struct ReentrantStopper {
    kernel: WeakKernel,
    peer: ServiceName,
    refused: AtomicUsize,
    unexpected: AtomicUsize,
}

impl LifecycleListener for ReentrantStopper {
    fn running(&self, name: &ServiceName) -> ListenerResult {
        let kernel = self.kernel.upgrade().ok_or("kernel dropped")?;
        match kernel.stop_service(name) {
            Err(e) if e.is_illegal_state() => self.refused.fetch_add(1, Ordering::SeqCst),
            _ => self.unexpected.fetch_add(1, Ordering::SeqCst),
        };
        kernel.stop_service(&self.peer)?;
        Ok(())
    }
}

#[test]
fn test_concurrent_listener_reentry_is_refused_without_deadlock() {
    let stack = boot_stack("reenter");
    let (a, b) = (name("reenter/a"), name("reenter/b"));
    for service in [&a, &b] {
        stack
            .kernel
            .load_service(service.clone(), Arc::new(FnServiceFactory::instance("Unit", ())), ServiceEnvironment::new("reenter"))
            .unwrap();
    }
    let events = Arc::new(EventLog::default());
    stack.kernel.add_lifecycle_listener(events.clone(), vec![NamePattern::exact(&a)]);
    let stopper = Arc::new(ReentrantStopper {
        kernel: stack.kernel.downgrade(),
        peer: b.clone(),
        refused: AtomicUsize::new(0),
        unexpected: AtomicUsize::new(0),
    });
    stack.kernel.add_lifecycle_listener(stopper.clone(), vec![NamePattern::exact(&a)]);

    let threads = (0..THREADS)
        .map(|i| {
            let kernel = stack.kernel.clone();
            let service = if i % 2 == 0 { a.clone() } else { b.clone() };
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    kernel.start_service(&service).unwrap();
                    kernel.stop_service(&service).unwrap();
                }
            })
        })
        .collect();
    join_within_deadline(threads);

    let runs = events.count("running:");
    assert!(runs >= 1);
    assert_eq!(stopper.refused.load(Ordering::SeqCst), runs);
    assert_eq!(stopper.unexpected.load(Ordering::SeqCst), 0);
    assert_eq!(events.count("stopped:"), runs);
    stack.kernel.shutdown().unwrap();
}
