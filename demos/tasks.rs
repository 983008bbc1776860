extern crate cokit;

use cokit::awaitable::{Awaitable, Offload, Resumer};
use cokit::{Result, Task, ThreadPool};

// prints every step of the suspension protocol
struct Loud(i32);

impl Awaitable for Loud {
    type Output = i32;

    fn is_ready(&self) -> bool {
        println!("is_ready() called");
        false
    }

    fn on_suspend(&mut self, resumer: Resumer) {
        println!("on_suspend() called");
        resumer.resume();
    }

    fn on_resume(self) -> Result<i32> {
        println!("on_resume() called");
        Ok(self.0)
    }
}

fn compute(x: i32) -> Task<'static, i32> {
    Task::new(move |_| {
        println!("Computing {x} * 2...");
        x * 2
    })
}

fn main() {
    println!("=== task ===");
    let mut task = compute(21);
    println!("the task already ran: {}", task.is_done());
    println!("Result: {}", task.get().unwrap());

    println!("\n=== awaitable ===");
    let mut task = Task::new(|cx| {
        println!("Before await");
        let v = cx.await_(Loud(42));
        println!("After await");
        v
    });
    println!("Awaitable result: {}", task.get().unwrap());

    println!("\n=== offload ===");
    let pool = ThreadPool::new(2);
    let mut task = Task::new(|cx| {
        let mut total = 0u64;
        for n in 1..=4u64 {
            total += cx.await_(Offload::new(&pool, move || {
                let name = std::thread::current().name().map(str::to_owned);
                println!("  squaring {n} on {}", name.as_deref().unwrap_or("?"));
                n * n
            }));
        }
        total
    });
    println!("suspended on the pool: {}", !task.is_done());
    println!("Sum of squares: {}", task.get().unwrap());
}
