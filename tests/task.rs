extern crate cokit;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cokit::awaitable::{Awaitable, Immediate, Offload, Ready, Resumer};
use cokit::{Error, Result, Task, ThreadPool};
use parking_lot::Mutex;

// completes from a helper thread after a short delay
struct Later {
    value: u32,
    slot: Arc<Mutex<Option<u32>>>,
}

impl Later {
    fn new(value: u32) -> Self {
        Later {
            value,
            slot: Arc::new(Mutex::new(None)),
        }
    }
}

impl Awaitable for Later {
    type Output = u32;

    fn is_ready(&self) -> bool {
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        let slot = self.slot.clone();
        let v = self.value;
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *slot.lock() = Some(v);
            resumer.resume();
        });
    }

    fn on_resume(self) -> Result<u32> {
        self.slot.lock().take().ok_or(Error::Canceled)
    }
}

// parks the resumer where the test can fire it
struct Parked(Rc<RefCell<Option<Resumer>>>);

impl Awaitable for Parked {
    type Output = ();

    fn is_ready(&self) -> bool {
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        *self.0.borrow_mut() = Some(resumer);
    }

    fn on_resume(self) -> Result<()> {
        Ok(())
    }
}

struct Guard<'a>(&'a Cell<usize>);

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn get_is_idempotent() {
    let runs = Cell::new(0);
    let mut task = Task::new(|_| {
        runs.set(runs.get() + 1);
        42
    });
    for _ in 0..3 {
        assert_eq!(task.get(), Ok(&42));
    }
    drop(task);
    assert_eq!(runs.get(), 1);
}

#[test]
fn failure_is_cached() {
    let mut task = Task::<i32>::new(|_| panic!("bad task"));
    assert!(task.is_done());
    for _ in 0..3 {
        assert_eq!(task.get(), Err(Error::Panicked("bad task".into())));
    }
}

#[test]
fn awaits_in_order() {
    let mut task = Task::new(|cx| {
        let a = cx.await_(Ready(1));
        let b = cx.await_(Immediate(2));
        let c = cx.await_(Later::new(3));
        vec![a, b, c]
    });
    assert_eq!(task.get(), Ok(&vec![1, 2, 3]));
}

#[test]
fn resumed_from_another_thread() {
    let mut task = Task::new(|cx| {
        let mut sum = 0;
        for i in 1..=4 {
            sum += cx.await_(Later::new(i));
        }
        sum
    });
    // the first `Later` cannot have fired yet
    assert!(!task.is_done());
    assert_eq!(task.into_result(), Ok(10));
}

#[test]
fn poll_until_resumed() {
    let parked = Rc::new(RefCell::new(None));
    let p = parked.clone();
    let mut task = Task::new(move |cx| {
        cx.await_(Parked(p.clone()));
        cx.await_(Parked(p));
        "woken twice"
    });

    for _ in 0..2 {
        assert!(!task.poll());
        let resumer = parked.borrow_mut().take().unwrap();
        assert!(!task.poll());
        resumer.resume();
    }
    assert!(task.poll());
    assert_eq!(task.get(), Ok(&"woken twice"));
}

#[test]
fn offload_to_pool() {
    let pool = ThreadPool::new(2);
    let mut task = Task::new(|cx| {
        let name = cx.await_(Offload::new(&pool, || {
            thread::current().name().map(str::to_owned)
        }));
        let v = cx.await_(Offload::new(&pool, || 21)) * 2;
        (name, v)
    });
    let (name, v) = task.get().unwrap();
    assert!(name.as_deref().unwrap().starts_with("cokit-pool-"));
    assert_eq!(*v, 42);
}

#[test]
fn awaited_failure_fails_the_task() {
    let pool = ThreadPool::new(1);
    let mut task = Task::new(|cx| {
        let job = || -> u8 { panic!("offloaded") };
        cx.await_(Offload::new(&pool, job))
    });
    assert_eq!(task.get(), Err(Error::Panicked("offloaded".into())));

    pool.shutdown();
    let mut task = Task::new(|cx| cx.await_(Offload::new(&pool, || 1)));
    assert_eq!(task.get(), Err(Error::ShutDown));
}

#[test]
fn try_await_lets_the_body_recover() {
    let pool = ThreadPool::new(1);
    pool.shutdown();
    let mut task = Task::new(|cx| match cx.try_await(Offload::new(&pool, || 1)) {
        Ok(v) => v,
        Err(Error::ShutDown) => -1,
        Err(_) => 0,
    });
    assert_eq!(task.get(), Ok(&-1));
}

#[test]
fn panicking_on_suspend_fails_the_task() {
    struct Broken;

    impl Awaitable for Broken {
        type Output = ();

        fn is_ready(&self) -> bool {
            false
        }

        fn on_suspend(&mut self, _: Resumer) {
            panic!("cannot subscribe");
        }

        fn on_resume(self) -> Result<()> {
            Ok(())
        }
    }

    let reached = Cell::new(false);
    let mut task = Task::new(|cx| {
        cx.await_(Broken);
        reached.set(true);
    });
    assert_eq!(task.get(), Err(Error::Panicked("cannot subscribe".into())));
    drop(task);
    assert!(!reached.get());
}

#[test]
fn drop_suspended_task_unwinds_body() {
    let drops = Cell::new(0);
    let finished = Cell::new(false);
    let parked = Rc::new(RefCell::new(None));
    {
        let p = parked.clone();
        let task = Task::new(|cx| {
            let _guard = Guard(&drops);
            cx.await_(Parked(p));
            finished.set(true);
        });
        assert!(!task.is_done());
        assert_eq!(drops.get(), 0);
    }
    assert_eq!(drops.get(), 1);
    assert!(!finished.get());

    // a late resume on a dropped task is a no-op
    parked.borrow_mut().take().unwrap().resume();
}

#[test]
fn ready_task_skips_the_frame() {
    let task = Task::ready(String::from("done"));
    assert!(task.is_done());
    assert_eq!(task.into_result().as_deref(), Ok("done"));
}

// gives up on the operation: the resumer is dropped without resuming
struct Abandon {
    delay: Option<Duration>,
}

impl Awaitable for Abandon {
    type Output = ();

    fn is_ready(&self) -> bool {
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        if let Some(delay) = self.delay {
            thread::spawn(move || {
                thread::sleep(delay);
                drop(resumer);
            });
        }
    }

    fn on_resume(self) -> Result<()> {
        Ok(())
    }
}

#[test]
fn abandoned_task_fails_instead_of_hanging() {
    let drops = Cell::new(0);
    let finished = Cell::new(false);
    let mut task = Task::new(|cx| {
        let _guard = Guard(&drops);
        cx.await_(Abandon {
            delay: Some(Duration::from_millis(20)),
        });
        finished.set(true);
    });
    assert_eq!(task.get(), Err(Error::Canceled));
    assert_eq!(task.get(), Err(Error::Canceled));
    assert_eq!(drops.get(), 1);
    assert!(!finished.get());
}

#[test]
fn poll_sees_an_inline_abandon() {
    let mut task = Task::new(|cx| {
        cx.await_(Abandon { delay: None });
        1
    });
    assert!(task.is_done());
    assert!(task.poll());
    assert_eq!(task.into_result(), Err(Error::Canceled));
}
